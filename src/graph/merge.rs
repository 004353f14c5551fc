//! Graph merge engine.
//!
//! Folds one extraction batch into a graph snapshot in three strictly ordered
//! passes:
//!
//! ```text
//! 1. node merge      candidates resolved by label → update or append
//! 2. edge creation   labels resolved against the post-merge node list
//! 3. edge removal    every edge matching a resolved triple is dropped
//! ```
//!
//! Unresolved labels in passes 2 and 3 are policy, not errors: the proposal
//! is skipped and counted in [`MergeStats`]. The input graph is never
//! touched; the caller adopts the returned graph as the new snapshot.

use tracing::debug;

use super::resolve::resolve;
use super::resolve::resolve_index;
use super::{Edge, EdgeProposal, Graph, Node, NodeCandidate, new_id};

/// Counters describing what a merge did. Used for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub edges_created: usize,
    /// Edge proposals whose triple already existed.
    pub edges_duplicate: usize,
    /// Edge proposals with an endpoint label that did not resolve.
    pub edges_dropped: usize,
    pub edges_removed: usize,
    /// Removal requests with an endpoint label that did not resolve.
    pub removals_skipped: usize,
}

/// Produce the next graph from `current` and one extraction batch.
pub fn merge(
    current: &Graph,
    candidates: Vec<NodeCandidate>,
    to_create: &[EdgeProposal],
    to_remove: &[EdgeProposal],
) -> (Graph, MergeStats) {
    let mut stats = MergeStats::default();

    let nodes = merge_nodes(current.nodes.clone(), candidates, &mut stats);
    let mut edges = current.edges.clone();
    create_edges(&nodes, &mut edges, to_create, &mut stats);
    remove_edges(&nodes, &mut edges, to_remove, &mut stats);

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        created = stats.nodes_created,
        updated = stats.nodes_updated,
        edges_created = stats.edges_created,
        edges_removed = stats.edges_removed,
        edges_dropped = stats.edges_dropped,
        "graph merged"
    );

    (Graph { nodes, edges }, stats)
}

// ── Pass 1: nodes ─────────────────────────────────────────────────────────────

fn merge_nodes(mut nodes: Vec<Node>, candidates: Vec<NodeCandidate>, stats: &mut MergeStats) -> Vec<Node> {
    for candidate in candidates {
        match resolve_index(&candidate.label, &nodes) {
            Some(i) => {
                let description = candidate.description.clone().filter(|d| !d.is_empty());
                let existing = &mut nodes[i];
                existing.attributes.extend(candidate.cleaned_attributes());
                if description.is_some() {
                    existing.description = description;
                }
                stats.nodes_updated += 1;
            }
            None => {
                let label = candidate.label.clone();
                let node_type = candidate.node_type;
                let description = candidate.description.clone().unwrap_or_default();
                nodes.push(Node {
                    id: new_id(),
                    label,
                    node_type,
                    description: Some(description),
                    attributes: candidate.cleaned_attributes(),
                });
                stats.nodes_created += 1;
            }
        }
    }
    nodes
}

// ── Pass 2: edge creation ─────────────────────────────────────────────────────

fn create_edges(nodes: &[Node], edges: &mut Vec<Edge>, proposals: &[EdgeProposal], stats: &mut MergeStats) {
    for p in proposals {
        let (Some(source), Some(target)) = (resolve(&p.source_label, nodes), resolve(&p.target_label, nodes)) else {
            debug!(source = %p.source_label, target = %p.target_label, predicate = %p.predicate, "edge dropped: unresolved endpoint");
            stats.edges_dropped += 1;
            continue;
        };
        if edges.iter().any(|e| e.matches(&source.id, &target.id, &p.predicate)) {
            stats.edges_duplicate += 1;
            continue;
        }
        edges.push(Edge {
            id: new_id(),
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            predicate: p.predicate.clone(),
            attributes: None,
        });
        stats.edges_created += 1;
    }
}

// ── Pass 3: edge removal ──────────────────────────────────────────────────────

fn remove_edges(nodes: &[Node], edges: &mut Vec<Edge>, removals: &[EdgeProposal], stats: &mut MergeStats) {
    for r in removals {
        let (Some(source), Some(target)) = (resolve(&r.source_label, nodes), resolve(&r.target_label, nodes)) else {
            stats.removals_skipped += 1;
            continue;
        };
        let before = edges.len();
        edges.retain(|e| !e.matches(&source.id, &target.id, &r.predicate));
        stats.edges_removed += before - edges.len();
    }
}
