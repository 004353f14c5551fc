//! Extraction invocation: turns (current nodes, conversation) into a
//! validated [`ExtractionPayload`] via the configured LLM provider.
//!
//! The provider is asked for structured output against
//! [`schema::extraction_schema`]. Whatever comes back is parsed at this
//! boundary; a reply that does not fit the payload shape becomes
//! [`ExtractionError::Malformed`] and never reaches the merge engine.

pub mod prompt;
pub mod schema;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::{EdgeProposal, Node, NodeCandidate};
use crate::llm::{JsonSchemaFormat, LlmProvider, Message, ProviderError};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("malformed extraction payload: {0}")]
    Malformed(String),
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// Graph delta proposed by one extraction call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionPayload {
    pub extracted_nodes: Vec<NodeCandidate>,
    pub extracted_edges: Vec<EdgeProposal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges_to_remove: Vec<EdgeProposal>,
    #[serde(default)]
    pub suggested_follow_up: Option<String>,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

impl ExtractionPayload {
    /// Parse a provider reply. A surrounding Markdown code fence is tolerated.
    pub fn parse(text: &str) -> Result<Self, ExtractionError> {
        let body = strip_code_fence(text);
        serde_json::from_str(body).map_err(|e| ExtractionError::Malformed(e.to_string()))
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and trailing fence.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Extraction capability: a provider plus the prompt location.
///
/// Cheap to clone; holds no per-turn state.
#[derive(Debug, Clone)]
pub struct Extractor {
    provider: LlmProvider,
    prompts_dir: PathBuf,
}

impl Extractor {
    pub fn new(provider: LlmProvider, prompts_dir: impl Into<PathBuf>) -> Self {
        Self { provider, prompts_dir: prompts_dir.into() }
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Ask the model for a graph delta.
    ///
    /// `nodes` is serialised into the system prompt so the model can reuse
    /// existing labels; `conversation` is sent verbatim after it.
    pub async fn extract(
        &self,
        nodes: &[Node],
        conversation: &[Message],
    ) -> Result<ExtractionPayload, ExtractionError> {
        let nodes_json = serde_json::to_string(nodes)
            .map_err(|e| ExtractionError::Malformed(format!("cannot serialise current nodes: {e}")))?;
        let system = prompt::loom_prompt(&self.prompts_dir, &nodes_json);

        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(system));
        messages.extend_from_slice(conversation);

        let format = JsonSchemaFormat {
            name: schema::SCHEMA_NAME.to_string(),
            schema: schema::extraction_schema(),
        };

        let response = self.provider.complete(&messages, Some(&format)).await?;
        if let Some(usage) = response.usage {
            debug!(
                provider = self.provider.name(),
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cached_input_tokens = usage.cached_input_tokens,
                "extraction usage"
            );
        }

        let payload = ExtractionPayload::parse(&response.text).inspect_err(|e| {
            warn!(provider = self.provider.name(), error = %e, "extraction reply rejected");
        })?;

        debug!(
            nodes = payload.extracted_nodes.len(),
            edges = payload.extracted_edges.len(),
            removals = payload.edges_to_remove.len(),
            "extraction payload accepted"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AttributeValue, Coordinates, NodeType};
    use crate::llm::providers::dummy::DummyProvider;

    const FULL_REPLY: &str = r#"{
        "extractedNodes": [
            {
                "label": "Paris",
                "type": "Place",
                "description": null,
                "attributes": {
                    "coordinates": { "x": 2.35, "y": 48.85 },
                    "timestamp": null,
                    "locationType": "city",
                    "extraInfo": null
                }
            }
        ],
        "extractedEdges": [
            { "sourceLabel": "Alice", "targetLabel": "Paris", "predicate": "LIVES_IN" }
        ],
        "edgesToRemove": [],
        "suggestedFollowUp": "How long has Alice lived in Paris?"
    }"#;

    #[test]
    fn parses_full_payload() {
        let p = ExtractionPayload::parse(FULL_REPLY).unwrap();
        assert_eq!(p.extracted_nodes.len(), 1);
        let node = &p.extracted_nodes[0];
        assert_eq!(node.node_type, NodeType::Place);
        assert!(node.description.is_none());
        assert_eq!(
            node.attributes["coordinates"],
            Some(AttributeValue::Coordinates(Coordinates { x: 2.35, y: 48.85 }))
        );
        assert_eq!(node.attributes["timestamp"], None);
        assert_eq!(p.extracted_edges[0], EdgeProposal::new("Alice", "Paris", "LIVES_IN"));
        assert_eq!(p.suggested_follow_up.as_deref(), Some("How long has Alice lived in Paris?"));
    }

    #[test]
    fn optional_sections_default() {
        let p = ExtractionPayload::parse(r#"{"extractedNodes":[],"extractedEdges":[],"edgesToRemove":null}"#).unwrap();
        assert!(p.edges_to_remove.is_empty());
        assert!(p.suggested_follow_up.is_none());

        let p = ExtractionPayload::parse(r#"{"extractedNodes":[],"extractedEdges":[]}"#).unwrap();
        assert!(p.edges_to_remove.is_empty());
    }

    #[test]
    fn missing_required_section_is_malformed() {
        let err = ExtractionPayload::parse(r#"{"extractedNodes":[]}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(ref m) if m.contains("extractedEdges")));
    }

    #[test]
    fn unknown_node_type_is_malformed() {
        let reply = r#"{"extractedNodes":[{"label":"Rex","type":"Animal","attributes":{}}],"extractedEdges":[]}"#;
        assert!(matches!(ExtractionPayload::parse(reply), Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn plain_text_is_malformed() {
        assert!(matches!(ExtractionPayload::parse("[echo] hi"), Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let fenced = format!("```json\n{FULL_REPLY}\n```");
        assert_eq!(ExtractionPayload::parse(&fenced).unwrap().extracted_nodes.len(), 1);
        let bare = format!("```\n{FULL_REPLY}```");
        assert!(ExtractionPayload::parse(&bare).is_ok());
    }

    #[tokio::test]
    async fn extractor_returns_validated_payload() {
        let extractor = Extractor::new(
            LlmProvider::Dummy(DummyProvider::with_reply(FULL_REPLY)),
            "/nonexistent/prompts",
        );
        let payload = extractor.extract(&[], &[Message::user("Alice lives in Paris")]).await.unwrap();
        assert_eq!(payload.extracted_nodes[0].label, "Paris");
    }

    #[tokio::test]
    async fn extractor_rejects_echo() {
        let extractor = Extractor::new(LlmProvider::Dummy(DummyProvider::default()), "/nonexistent/prompts");
        let err = extractor.extract(&[], &[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }
}
