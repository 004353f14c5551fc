//! Knowledge-graph core: data model, label resolution, retraction
//! normalisation and the merge engine.
//!
//! Everything in this module is pure and synchronous. A turn hands in the
//! graph it currently holds and receives a fresh [`Graph`] back; nothing here
//! keeps state between calls.

pub mod merge;
pub mod resolve;
pub mod retract;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use merge::{MergeStats, merge};
pub use resolve::{resolve, resolve_index};
pub use retract::{NEGATION_PREFIX, Normalized, normalize};

// ── Node ──────────────────────────────────────────────────────────────────────

/// Closed set of entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Person,
    Place,
    Thing,
    Event,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Person => "Person",
            NodeType::Place => "Place",
            NodeType::Thing => "Thing",
            NodeType::Event => "Event",
        };
        write!(f, "{s}")
    }
}

/// Planar position used by the map perspective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// A single attribute value.
///
/// Extraction only ever produces text, numbers and coordinates. `Other`
/// keeps anything else a client stored on a node (booleans, arrays, free-form
/// objects) so that graphs round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Coordinates(Coordinates),
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self { AttributeValue::Text(v.to_string()) }
}
impl From<String> for AttributeValue {
    fn from(v: String) -> Self { AttributeValue::Text(v) }
}
impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self { AttributeValue::Number(v.into()) }
}
impl From<Coordinates> for AttributeValue {
    fn from(v: Coordinates) -> Self { AttributeValue::Coordinates(v) }
}

/// Attribute map of a node. Ordered by key so serialised output is stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// An entity in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// An entity as proposed by extraction, before resolution.
///
/// A `null` attribute means the model had nothing to say about that key; it
/// is stripped by [`NodeCandidate::cleaned_attributes`] and never erases a
/// stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCandidate {
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<AttributeValue>>,
}

impl NodeCandidate {
    pub fn new(label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            label: label.into(),
            node_type,
            description: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: Option<AttributeValue>) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Attribute map with null entries removed.
    pub fn cleaned_attributes(self) -> Attributes {
        self.attributes
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

// ── Edge ──────────────────────────────────────────────────────────────────────

/// A directed, labelled relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub predicate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, serde_json::Value>>,
}

impl Edge {
    /// `true` when this edge is the relationship instance `(source, target, predicate)`.
    /// Edge ids never take part in the comparison.
    pub fn matches(&self, source_id: &str, target_id: &str, predicate: &str) -> bool {
        self.source_id == source_id && self.target_id == target_id && self.predicate == predicate
    }
}

/// Label-addressed edge as proposed by extraction, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeProposal {
    pub source_label: String,
    pub target_label: String,
    pub predicate: String,
}

impl EdgeProposal {
    pub fn new(
        source_label: impl Into<String>,
        target_label: impl Into<String>,
        predicate: impl Into<String>,
    ) -> Self {
        Self {
            source_label: source_label.into(),
            target_label: target_label.into(),
            predicate: predicate.into(),
        }
    }
}

// ── Graph ─────────────────────────────────────────────────────────────────────

/// A complete graph snapshot: the unit a turn reads and replaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Fresh opaque identifier for a newly created node or edge.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
