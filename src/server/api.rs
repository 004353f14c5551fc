//! Handlers for the stateless routes.

use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use super::{ApiState, WELCOME_PROMPT};
use crate::extraction::ExtractionError;
use crate::graph::{Edge, Graph, Node};
use crate::turn::{ChatMessage, TurnOutcome, run_turn};

/// Upper bound on one turn, extraction round-trip included.
pub(super) const TURN_TIMEOUT: Duration = Duration::from_secs(120);

/// Generic, retry-safe message shown when a turn fails.
pub(super) const SNAGGED: &str = "The loom snagged a thread. Check server logs.";

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct WeaveRequest {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Serialize)]
pub(super) struct WeaveResponse {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub reply: String,
}

impl From<TurnOutcome> for WeaveResponse {
    fn from(o: TurnOutcome) -> Self {
        Self {
            nodes: o.graph.nodes,
            edges: o.graph.edges,
            reply: o.follow_up.unwrap_or_else(|| WELCOME_PROMPT.to_string()),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
pub(super) fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

/// 502 for a failed turn. Details stay in the log.
pub(super) fn turn_failed(e: ExtractionError) -> Response {
    error!(error = %e, "loom error");
    (StatusCode::BAD_GATEWAY, json_error("extraction_failed", SNAGGED)).into_response()
}

/// 504 for a turn that exceeded [`TURN_TIMEOUT`].
pub(super) fn turn_timed_out() -> Response {
    warn!(timeout_secs = TURN_TIMEOUT.as_secs(), "turn timed out");
    (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", "LLM request timed out")).into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /server-test
pub(super) async fn server_test() -> &'static str {
    "Server available"
}

/// POST /weave
pub(super) async fn weave(State(state): State<ApiState>, Json(req): Json<WeaveRequest>) -> Response {
    let prior = Graph::new(req.nodes, req.edges);
    match tokio::time::timeout(TURN_TIMEOUT, run_turn(&state.extractor, &prior, &req.history, &req.message)).await {
        Ok(Ok(outcome)) => (StatusCode::OK, Json(WeaveResponse::from(outcome))).into_response(),
        Ok(Err(e)) => turn_failed(e),
        Err(_) => turn_timed_out(),
    }
}
