//! Neighbourhood expansion

use super::index::AdjacencyIndex;
use super::types::Reach;
use crate::graph::ElementId;
use std::collections::HashMap;

/// Query for every element within `max_depth` hops of an origin
#[derive(Debug, Clone)]
pub struct ConnectedQuery {
    pub origin: ElementId,
    pub max_depth: usize,
}

impl ConnectedQuery {
    pub fn around(origin: ElementId) -> Self {
        Self {
            origin,
            max_depth: 2,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Level-by-level BFS. The first level that reaches an element is its
    /// minimum depth. The origin is never reported.
    ///
    /// Results are sorted by depth, then ID.
    pub fn execute(&self, index: &AdjacencyIndex) -> Vec<Reach> {
        let mut depths: HashMap<ElementId, usize> = HashMap::new();
        depths.insert(self.origin, 0);
        let mut frontier = vec![self.origin];

        for depth in 1..=self.max_depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for id in &frontier {
                for neighbor in index.neighbors(id) {
                    if !depths.contains_key(neighbor) {
                        depths.insert(*neighbor, depth);
                        next_frontier.push(*neighbor);
                    }
                }
            }
            frontier = next_frontier;
        }

        let mut reached: Vec<Reach> = depths
            .into_iter()
            .filter(|(id, _)| *id != self.origin)
            .map(|(id, depth)| Reach { depth, id })
            .collect();
        reached.sort();
        reached
    }
}
