//! Adjacency view over a set of associations

use super::types::Direction;
use crate::graph::{Association, ElementId};
use std::collections::HashMap;

/// Neighbour lists built from associations that pass a strength threshold.
///
/// In `Undirected` mode every association contributes to both endpoints'
/// lists; the associations themselves keep their direction. Parallel
/// associations collapse into one neighbour entry, and lists are sorted so
/// traversal order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyIndex {
    neighbors: HashMap<ElementId, Vec<ElementId>>,
}

impl AdjacencyIndex {
    pub fn build<'a, I>(associations: I, min_strength: f32, direction: Direction) -> Self
    where
        I: IntoIterator<Item = &'a Association>,
    {
        let mut neighbors: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for assoc in associations {
            if !assoc.passes(min_strength) {
                continue;
            }
            neighbors.entry(assoc.source).or_default().push(assoc.target);
            if direction == Direction::Undirected && !assoc.is_self_loop() {
                neighbors.entry(assoc.target).or_default().push(assoc.source);
            }
        }
        for list in neighbors.values_mut() {
            list.sort();
            list.dedup();
        }
        Self { neighbors }
    }

    pub fn neighbors(&self, id: &ElementId) -> &[ElementId] {
        self.neighbors.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of distinct (from, to) adjacencies
    pub fn adjacency_count(&self) -> usize {
        self.neighbors.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_edges_are_absent() {
        let a = ElementId::new();
        let b = ElementId::new();
        let c = ElementId::new();
        let edges = vec![
            Association::new(a, b, "t", 0.5),
            Association::new(a, c, "t", 0.2),
        ];
        let index = AdjacencyIndex::build(&edges, 0.3, Direction::Outgoing);
        assert_eq!(index.neighbors(&a), &[b]);
        assert!(index.neighbors(&b).is_empty());
    }

    #[test]
    fn undirected_mode_links_both_endpoints() {
        let a = ElementId::new();
        let b = ElementId::new();
        let edges = vec![Association::new(a, b, "t", 0.5)];
        let index = AdjacencyIndex::build(&edges, 0.0, Direction::Undirected);
        assert_eq!(index.neighbors(&a), &[b]);
        assert_eq!(index.neighbors(&b), &[a]);
    }

    #[test]
    fn parallel_edges_collapse() {
        let a = ElementId::new();
        let b = ElementId::new();
        let edges = vec![
            Association::new(a, b, "embedding_similarity", 0.5),
            Association::new(a, b, "co_occurrence", 0.9),
        ];
        let index = AdjacencyIndex::build(&edges, 0.0, Direction::Outgoing);
        assert_eq!(index.adjacency_count(), 1);
    }

    #[test]
    fn self_loop_appears_once_undirected() {
        let a = ElementId::new();
        let edges = vec![Association::new(a, a, "t", 0.5)];
        let index = AdjacencyIndex::build(&edges, 0.0, Direction::Undirected);
        assert_eq!(index.neighbors(&a), &[a]);
    }
}
