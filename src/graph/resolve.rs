//! Label → node resolution.
//!
//! Matching is whole-string and case-insensitive. Labels are not trimmed and
//! no fuzzy matching is attempted: `"Paris "` does not resolve to `"Paris"`.
//! When several nodes share a label (corrupted or pre-seeded data) the first
//! one in sequence order wins.

use super::Node;

/// Case-insensitive whole-string label comparison.
pub fn labels_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Position of the node whose label matches `label`, if any.
pub fn resolve_index(label: &str, nodes: &[Node]) -> Option<usize> {
    nodes.iter().position(|n| labels_match(&n.label, label))
}

/// The node whose label matches `label`, if any.
pub fn resolve<'a>(label: &str, nodes: &'a [Node]) -> Option<&'a Node> {
    resolve_index(label, nodes).map(|i| &nodes[i])
}
