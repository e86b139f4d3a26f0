//! Simple-path enumeration

use super::index::AdjacencyIndex;
use super::types::GraphPath;
use crate::graph::ElementId;
use std::collections::HashSet;

/// Query for every simple path between two elements
#[derive(Debug, Clone)]
pub struct PathQuery {
    pub source: ElementId,
    pub target: ElementId,
    /// Maximum path length in hops
    pub max_depth: usize,
}

impl PathQuery {
    pub fn between(source: ElementId, target: ElementId) -> Self {
        Self {
            source,
            target,
            max_depth: 3,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enumerate paths with a depth-first walk carrying the path so far.
    ///
    /// A path never revisits an element, so cycles in the graph cannot
    /// loop the search. A source equal to the target yields nothing.
    pub fn execute(&self, index: &AdjacencyIndex) -> Vec<GraphPath> {
        if self.source == self.target || self.max_depth == 0 {
            return Vec::new();
        }

        let mut found: Vec<GraphPath> = Vec::new();
        let mut seen: HashSet<Vec<ElementId>> = HashSet::new();
        let mut path = vec![self.source];
        let mut on_path: HashSet<ElementId> = HashSet::from([self.source]);
        self.walk(index, &mut path, &mut on_path, &mut seen, &mut found);

        found.sort_by(|a, b| a.length.cmp(&b.length).then_with(|| a.elements.cmp(&b.elements)));
        found
    }

    fn walk(
        &self,
        index: &AdjacencyIndex,
        path: &mut Vec<ElementId>,
        on_path: &mut HashSet<ElementId>,
        seen: &mut HashSet<Vec<ElementId>>,
        found: &mut Vec<GraphPath>,
    ) {
        let Some(current) = path.last().copied() else {
            return;
        };
        // path.len() - 1 hops taken so far
        if path.len() > self.max_depth {
            return;
        }
        for next in index.neighbors(&current) {
            if on_path.contains(next) {
                continue;
            }
            path.push(*next);
            if *next == self.target {
                if seen.insert(path.clone()) {
                    found.push(GraphPath::new(path.clone()));
                }
            } else {
                on_path.insert(*next);
                self.walk(index, path, on_path, seen, found);
                on_path.remove(next);
            }
            path.pop();
        }
    }
}
