//! Turn orchestrator: extract → normalise retractions → merge.
//!
//! A turn is a single sequential pipeline. The only suspension point is the
//! extraction call; if it fails the error is returned unchanged and the prior
//! graph is left exactly as it was (the merge only ever builds a new graph).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extraction::{ExtractionError, Extractor};
use crate::graph::{self, Graph, MergeStats};
use crate::llm::Message;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

impl From<&ChatMessage> for Message {
    fn from(m: &ChatMessage) -> Self {
        match m.role {
            ChatRole::User => Message::user(m.content.clone()),
            ChatRole::Assistant => Message::assistant(m.content.clone()),
        }
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The complete new graph; replaces the caller's snapshot.
    pub graph: Graph,
    /// The model's suggested follow-up, verbatim. `None` when the model gave
    /// none; the caller decides what to show instead.
    pub follow_up: Option<String>,
    pub stats: MergeStats,
}

/// Run one turn against `prior`.
///
/// `history` is the conversation so far; `message` is the new user input and
/// is appended to it before extraction.
pub async fn run_turn(
    extractor: &Extractor,
    prior: &Graph,
    history: &[ChatMessage],
    message: &str,
) -> Result<TurnOutcome, ExtractionError> {
    let mut conversation: Vec<Message> = history.iter().map(Message::from).collect();
    conversation.push(Message::user(message));

    let payload = extractor.extract(&prior.nodes, &conversation).await?;

    let normalized = graph::normalize(payload.extracted_edges, payload.edges_to_remove);
    let (graph, stats) = graph::merge(
        prior,
        payload.extracted_nodes,
        &normalized.to_create,
        &normalized.to_remove,
    );

    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        nodes_created = stats.nodes_created,
        edges_created = stats.edges_created,
        edges_removed = stats.edges_removed,
        "turn woven"
    );

    Ok(TurnOutcome { graph, follow_up: payload.suggested_follow_up, stats })
}
