//! Retraction normaliser.
//!
//! Extraction models sometimes express "X is not Y" as a positive edge with a
//! negated predicate (`NOT_FRIEND_OF`) instead of using the removal channel.
//! [`normalize`] turns those into removal requests for the base predicate so
//! the merge engine never creates a negated edge.

use super::EdgeProposal;

/// Reserved predicate prefix marking a negated relationship.
pub const NEGATION_PREFIX: &str = "NOT_";

/// Output of [`normalize`]: what to create and what to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub to_create: Vec<EdgeProposal>,
    /// Explicit removals first, then inferred ones in proposal order.
    pub to_remove: Vec<EdgeProposal>,
}

/// Base predicate of a negated predicate, or `None` when `predicate` is not
/// negated. The prefix check is ASCII case-insensitive; the remainder keeps
/// its original casing. A bare `NOT_` yields an empty base predicate.
pub fn negated_base(predicate: &str) -> Option<&str> {
    let n = NEGATION_PREFIX.len();
    match predicate.get(..n) {
        Some(head) if head.eq_ignore_ascii_case(NEGATION_PREFIX) => Some(&predicate[n..]),
        _ => None,
    }
}

/// Split extracted edges into creations and removals.
pub fn normalize(extracted_edges: Vec<EdgeProposal>, edges_to_remove: Vec<EdgeProposal>) -> Normalized {
    let mut to_create = Vec::with_capacity(extracted_edges.len());
    let mut to_remove = edges_to_remove;

    for edge in extracted_edges {
        match negated_base(&edge.predicate) {
            Some(base) => {
                tracing::debug!(
                    source = %edge.source_label,
                    target = %edge.target_label,
                    predicate = %edge.predicate,
                    "negated edge rewritten as retraction"
                );
                let predicate = base.to_string();
                to_remove.push(EdgeProposal { predicate, ..edge });
            }
            None => to_create.push(edge),
        }
    }

    Normalized { to_create, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_edges_pass_through() {
        let edges = vec![EdgeProposal::new("Alice", "Bob", "FRIEND_OF")];
        let out = normalize(edges.clone(), vec![]);
        assert_eq!(out.to_create, edges);
        assert!(out.to_remove.is_empty());
    }

    #[test]
    fn negated_edge_becomes_removal() {
        let out = normalize(vec![EdgeProposal::new("Alice", "Bob", "NOT_FRIEND_OF")], vec![]);
        assert!(out.to_create.is_empty());
        assert_eq!(out.to_remove, vec![EdgeProposal::new("Alice", "Bob", "FRIEND_OF")]);
    }

    #[test]
    fn prefix_check_ignores_case_but_keeps_remainder() {
        assert_eq!(negated_base("not_LIVES_IN"), Some("LIVES_IN"));
        assert_eq!(negated_base("Not_likes"), Some("likes"));
        assert_eq!(negated_base("NOT_"), Some(""));
    }

    #[test]
    fn similar_prefixes_are_not_negations() {
        assert_eq!(negated_base("NOTABLE_FOR"), None);
        assert_eq!(negated_base("NOTED_BY"), None);
        assert_eq!(negated_base("NOT"), None);
        assert_eq!(negated_base("KNOWS"), None);
        assert_eq!(negated_base(""), None);
    }

    #[test]
    fn multibyte_predicate_does_not_panic() {
        assert_eq!(negated_base("ÄÖÜ_X"), None);
        assert_eq!(negated_base("NÖT_X"), None);
    }

    #[test]
    fn explicit_removals_come_first() {
        let explicit = vec![EdgeProposal::new("A", "B", "KNOWS")];
        let out = normalize(
            vec![
                EdgeProposal::new("A", "C", "NOT_OWNS"),
                EdgeProposal::new("A", "D", "VISITED"),
            ],
            explicit,
        );
        assert_eq!(out.to_create, vec![EdgeProposal::new("A", "D", "VISITED")]);
        assert_eq!(
            out.to_remove,
            vec![EdgeProposal::new("A", "B", "KNOWS"), EdgeProposal::new("A", "C", "OWNS")]
        );
    }
}
