//! Project CRUD and the stored-graph weave route.
//!
//! `ProjectStore` is synchronous; every call goes through [`with_store`] so
//! SQLite I/O runs on the blocking pool, never on a runtime worker.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info};

use super::ApiState;
use super::api::{TURN_TIMEOUT, WeaveResponse, json_error, turn_failed, turn_timed_out};
use crate::error::AppError;
use crate::graph::Graph;
use crate::store::{ProjectData, ProjectStore};
use crate::turn::{ChatMessage, run_turn};

#[derive(Deserialize)]
pub(super) struct CreateProjectRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub(super) struct UpdateProjectRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub(super) struct ProjectWeaveRequest {
    message: String,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Run a synchronous store operation on the blocking pool.
async fn with_store<T, F>(state: &ApiState, op: &'static str, f: F) -> Result<T, AppError>
where
    F: FnOnce(&ProjectStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| AppError::Store(format!("{op} join: {e}")))?
}

/// Trimmed, non-empty project name.
fn clean_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

fn store_error(e: AppError) -> Response {
    error!(error = %e, "project store error");
    (StatusCode::INTERNAL_SERVER_ERROR, json_error("store_error", "project store unavailable")).into_response()
}

fn not_found(id: &str) -> Response {
    (StatusCode::NOT_FOUND, json_error("not_found", format!("no project {id}"))).into_response()
}

/// 404 for a project that vanished after its lock was taken. The lock entry
/// goes with it.
async fn gone(state: &ApiState, id: &str) -> Response {
    state.locks.forget(id).await;
    not_found(id)
}

async fn exists(state: &ApiState, id: &str) -> Result<bool, AppError> {
    let id = id.to_string();
    with_store(state, "exists", move |s| s.update(&id, None, None)).await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /projects
pub(super) async fn list(State(state): State<ApiState>) -> Response {
    match with_store(&state, "list", |s| s.list()).await {
        Ok(projects) => Json(projects).into_response(),
        Err(e) => store_error(e),
    }
}

/// POST /projects
pub(super) async fn create(State(state): State<ApiState>, Json(req): Json<CreateProjectRequest>) -> Response {
    let Some(name) = clean_name(req.name.as_deref()) else {
        return (StatusCode::BAD_REQUEST, json_error("bad_request", "name is required")).into_response();
    };
    match with_store(&state, "create", move |s| s.create(&name, req.data)).await {
        Ok(summary) => {
            info!(id = %summary.id, name = %summary.name, "project created");
            (StatusCode::CREATED, Json(summary)).into_response()
        }
        Err(e) => store_error(e),
    }
}

/// GET /projects/{id}
pub(super) async fn get(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let key = id.clone();
    match with_store(&state, "get", move |s| s.get(&key)).await {
        Ok(Some(project)) => Json(project).into_response(),
        Ok(None) => not_found(&id),
        Err(e) => store_error(e),
    }
}

/// PUT /projects/{id}
///
/// A blank `name` is ignored, as is an absent one.
pub(super) async fn update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Response {
    match exists(&state, &id).await {
        Ok(true) => {}
        Ok(false) => return not_found(&id),
        Err(e) => return store_error(e),
    }
    let _guard = state.locks.acquire(&id).await;

    let name = clean_name(req.name.as_deref());
    let key = id.clone();
    let result = with_store(&state, "update", move |s| {
        if !s.update(&key, name.as_deref(), req.data.as_ref())? {
            return Ok(None);
        }
        s.get(&key)
    })
    .await;

    match result {
        Ok(Some(project)) => Json(project).into_response(),
        Ok(None) => gone(&state, &id).await,
        Err(e) => store_error(e),
    }
}

/// DELETE /projects/{id}
pub(super) async fn delete(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let removed = {
        let _guard = state.locks.acquire(&id).await;
        let key = id.clone();
        with_store(&state, "delete", move |s| s.delete(&key)).await
    };
    // Entry was created by `acquire` above; drop it whether or not a row existed.
    state.locks.forget(&id).await;
    match removed {
        Ok(true) => {
            info!(%id, "project deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => not_found(&id),
        Err(e) => store_error(e),
    }
}

/// POST /projects/{id}/weave
///
/// Runs a turn against the stored graph and message log. The project is
/// written back only when the turn succeeds.
pub(super) async fn weave(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ProjectWeaveRequest>,
) -> Response {
    match exists(&state, &id).await {
        Ok(true) => {}
        Ok(false) => return not_found(&id),
        Err(e) => return store_error(e),
    }
    let _guard = state.locks.acquire(&id).await;

    let key = id.clone();
    let project = match with_store(&state, "get", move |s| s.get(&key)).await {
        Ok(Some(p)) => p,
        Ok(None) => return gone(&state, &id).await,
        Err(e) => return store_error(e),
    };
    let mut data = match ProjectData::from_value(project.data) {
        Ok(d) => d,
        Err(e) => return store_error(e),
    };

    let turn = run_turn(&state.extractor, &data.graph, &data.messages, &req.message);
    let outcome = match tokio::time::timeout(TURN_TIMEOUT, turn).await {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => return turn_failed(e),
        Err(_) => return turn_timed_out(),
    };

    let response = WeaveResponse::from(outcome);
    data.graph = Graph::new(response.nodes.clone(), response.edges.clone());
    data.messages.push(ChatMessage::user(req.message));
    data.messages.push(ChatMessage::assistant(response.reply.clone()));

    let value = match data.to_value() {
        Ok(v) => v,
        Err(e) => return store_error(e),
    };
    let key = id.clone();
    match with_store(&state, "save", move |s| s.update(&key, None, Some(&value))).await {
        Ok(true) => Json(response).into_response(),
        Ok(false) => gone(&state, &id).await,
        Err(e) => store_error(e),
    }
}
