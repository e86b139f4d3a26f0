//! Cycle detection through a single element

use super::index::AdjacencyIndex;
use super::types::Cycle;
use crate::graph::ElementId;
use std::collections::HashSet;

/// Query for closed walks through an origin element
#[derive(Debug, Clone)]
pub struct CycleQuery {
    pub origin: ElementId,
    /// Maximum cycle length in hops
    pub max_depth: usize,
}

impl CycleQuery {
    pub fn through(origin: ElementId) -> Self {
        Self {
            origin,
            max_depth: 3,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Every walk origin -> ... -> origin of at most `max_depth` hops.
    ///
    /// Interior elements never repeat; the origin appears only at both
    /// ends. A self-loop on the origin is a cycle of length 1.
    pub fn execute(&self, index: &AdjacencyIndex) -> Vec<Cycle> {
        if self.max_depth == 0 {
            return Vec::new();
        }

        let mut found = Vec::new();
        let mut seen: HashSet<Vec<ElementId>> = HashSet::new();
        let mut walk = vec![self.origin];
        let mut on_walk: HashSet<ElementId> = HashSet::from([self.origin]);
        self.extend(index, &mut walk, &mut on_walk, &mut seen, &mut found);

        found.sort_by(|a: &Cycle, b: &Cycle| {
            a.length.cmp(&b.length).then_with(|| a.elements.cmp(&b.elements))
        });
        found
    }

    fn extend(
        &self,
        index: &AdjacencyIndex,
        walk: &mut Vec<ElementId>,
        on_walk: &mut HashSet<ElementId>,
        seen: &mut HashSet<Vec<ElementId>>,
        found: &mut Vec<Cycle>,
    ) {
        let Some(current) = walk.last().copied() else {
            return;
        };
        if walk.len() > self.max_depth {
            return;
        }
        for next in index.neighbors(&current) {
            if *next == self.origin {
                walk.push(*next);
                if seen.insert(walk.clone()) {
                    found.push(Cycle::new(walk.clone()));
                }
                walk.pop();
                continue;
            }
            if on_walk.contains(next) {
                continue;
            }
            walk.push(*next);
            on_walk.insert(*next);
            self.extend(index, walk, on_walk, seen, found);
            on_walk.remove(next);
            walk.pop();
        }
    }
}
