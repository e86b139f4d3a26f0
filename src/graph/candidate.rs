//! Merge candidates: unordered pairs of elements flagged for fusion

use super::element::ElementId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unordered pair of element IDs.
///
/// Stored in canonical order (lower ID first) so `(A, B)` and `(B, A)`
/// produce the same key everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementPair {
    first: ElementId,
    second: ElementId,
}

impl ElementPair {
    pub fn new(a: ElementId, b: ElementId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Lower ID of the pair
    pub fn first(&self) -> ElementId {
        self.first
    }

    /// Higher ID of the pair
    pub fn second(&self) -> ElementId {
        self.second
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.first == *id || self.second == *id
    }

    pub fn is_degenerate(&self) -> bool {
        self.first == self.second
    }
}

impl std::fmt::Display for ElementPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// A pending proposal to merge two elements.
///
/// Produced by an external similarity detector; consumed by a successful
/// merge. A rejected merge leaves it in place with diagnostic metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub pair: ElementPair,
    /// Similarity score reported by the detector, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    /// Accumulated metadata (object)
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl MergeCandidate {
    pub fn new(a: ElementId, b: ElementId) -> Self {
        Self {
            pair: ElementPair::new(a, b),
            similarity: None,
            metadata: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }
}
