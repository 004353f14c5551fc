//! Axum-based HTTP surface.
//!
//! ## URL layout
//!
//! ```text
//! GET    /server-test              → "Server available"
//! POST   /weave                    stateless turn: graph in, graph out
//! GET    /projects                 (isqlite)
//! POST   /projects                 (isqlite)
//! GET    /projects/{id}            (isqlite)
//! PUT    /projects/{id}            (isqlite)
//! DELETE /projects/{id}            (isqlite)
//! POST   /projects/{id}/weave      (isqlite) turn against the stored graph
//! ```
//!
//! `serve()` drives the axum event loop; the [`CancellationToken`] is wired
//! to axum's graceful shutdown.

mod api;
#[cfg(feature = "isqlite")]
mod projects;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{Router, routing::{get, post}};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::extraction::Extractor;
#[cfg(feature = "isqlite")]
use crate::store::ProjectStore;

/// Reply used when the model suggests no follow-up.
pub const WELCOME_PROMPT: &str = "Welcome to the Tapestry. Name 3 People, Places, or Things to begin.";

// ── Per-project write lock ────────────────────────────────────────────────────

/// Serialises turns on the same project. Turns on different projects never
/// contend.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    /// Wait for exclusive access to project `id`.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget the lock of a deleted or missing project.
    pub async fn forget(&self, id: &str) {
        self.inner.lock().await.remove(id);
    }

    /// Number of project ids currently holding a lock entry.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct ApiState {
    pub extractor: Arc<Extractor>,
    #[cfg(feature = "isqlite")]
    pub store: Arc<ProjectStore>,
    pub locks: ProjectLocks,
}

impl ApiState {
    #[cfg(feature = "isqlite")]
    pub fn new(extractor: Extractor, store: ProjectStore) -> Self {
        Self { extractor: Arc::new(extractor), store: Arc::new(store), locks: ProjectLocks::default() }
    }

    #[cfg(not(feature = "isqlite"))]
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor: Arc::new(extractor), locks: ProjectLocks::default() }
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn serve(bind_addr: &str, state: ApiState, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "tapestry server spinning");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("tapestry server shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: ApiState) -> Router {
    let router = Router::new()
        .route("/server-test", get(api::server_test))
        .route("/weave",       post(api::weave));

    #[cfg(feature = "isqlite")]
    let router = router
        .route("/projects",            get(projects::list).post(projects::create))
        .route("/projects/{id}",       get(projects::get).put(projects::update).delete(projects::delete))
        .route("/projects/{id}/weave", post(projects::weave));

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_project_turns_are_serialised() {
        let locks = ProjectLocks::default();
        let guard = locks.acquire("p1").await;

        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p2")).await;
        assert!(other.is_ok(), "different project must not wait");

        let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p1")).await;
        assert!(same.is_err(), "same project must wait for the holder");

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire("p1")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn forget_drops_entry() {
        let locks = ProjectLocks::default();
        drop(locks.acquire("gone").await);
        assert_eq!(locks.tracked().await, 1);
        locks.forget("gone").await;
        assert_eq!(locks.tracked().await, 0);
    }
}
