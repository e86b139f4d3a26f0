//! Seeded random graphs for traversal property checks

use engram::{Association, Element, ElementId, ElementType, MemoryStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};

/// Shape of a generated graph
#[derive(Debug, Clone)]
pub struct RandomGraphConfig {
    pub nodes: usize,
    pub edges: usize,
    /// Probability that an edge is a self-loop
    pub self_loop_rate: f64,
}

impl Default for RandomGraphConfig {
    fn default() -> Self {
        Self {
            nodes: 8,
            edges: 18,
            self_loop_rate: 0.05,
        }
    }
}

/// A graph written to a store, with its edge list kept for reference checks
pub struct RandomGraph {
    pub nodes: Vec<ElementId>,
    pub edges: Vec<Association>,
}

impl RandomGraph {
    /// Generate and persist a graph. Strengths are multiples of 0.1 so
    /// threshold comparisons hit exact boundaries.
    pub fn generate(store: &dyn MemoryStore, seed: u64, config: &RandomGraphConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let nodes: Vec<ElementId> = (0..config.nodes)
            .map(|i| {
                let element = Element::new(ElementType::Concept, json!({ "n": i }));
                store.create_element(&element).expect("create element");
                element.id
            })
            .collect();

        let mut edges = Vec::with_capacity(config.edges);
        for _ in 0..config.edges {
            let source = nodes[rng.gen_range(0..nodes.len())];
            let target = if rng.gen_bool(config.self_loop_rate) {
                source
            } else {
                nodes[rng.gen_range(0..nodes.len())]
            };
            let strength = rng.gen_range(0..=10) as f32 / 10.0;
            let association = Association::new(source, target, "random", strength);
            store.create_association(&association).expect("create association");
            edges.push(association);
        }

        Self { nodes, edges }
    }

    /// Whether some edge from -> to passes the threshold
    pub fn has_edge(&self, from: &ElementId, to: &ElementId, min_strength: f32) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == *from && e.target == *to && e.strength >= min_strength)
    }

    /// Minimum hop count to every node reachable from `origin` (origin excluded)
    pub fn bfs_depths(
        &self,
        origin: ElementId,
        max_depth: usize,
        min_strength: f32,
        undirected: bool,
    ) -> HashMap<ElementId, usize> {
        let mut depths = HashMap::new();
        let mut seen = HashSet::from([origin]);
        let mut queue = VecDeque::from([(origin, 0usize)]);
        while let Some((node, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for edge in self.edges.iter().filter(|e| e.strength >= min_strength) {
                let next = if edge.source == node {
                    edge.target
                } else if undirected && edge.target == node {
                    edge.source
                } else {
                    continue;
                };
                if seen.insert(next) {
                    depths.insert(next, depth + 1);
                    queue.push_back((next, depth + 1));
                }
            }
        }
        depths
    }
}
