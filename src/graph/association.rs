//! Association representation: a directed, weighted edge between elements

use super::element::ElementId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssociationId(Uuid);

impl AssociationId {
    /// Create a new random AssociationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssociationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssociationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssociationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Pattern type assigned to links created from embedding similarity
pub const EMBEDDING_SIMILARITY: &str = "embedding_similarity";

/// A directed edge with a strength in [0, 1].
///
/// Parallel associations between the same pair are allowed; each carries its
/// own pattern type and strength. Thresholds compare with `>=`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Unique identifier
    pub id: AssociationId,
    /// Source element
    pub source: ElementId,
    /// Target element
    pub target: ElementId,
    /// Why the edge exists (e.g. "embedding_similarity")
    pub pattern_type: String,
    /// Edge weight (0.0 - 1.0)
    pub strength: f32,
    /// Optional free-form metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Association {
    /// Create a new association; strength is clamped into [0, 1]
    pub fn new(
        source: ElementId,
        target: ElementId,
        pattern_type: impl Into<String>,
        strength: f32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AssociationId::new(),
            source,
            target,
            pattern_type: pattern_type.into(),
            strength: clamp_strength(strength),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether this edge counts for a traversal with the given threshold
    pub fn passes(&self, min_strength: f32) -> bool {
        self.strength >= min_strength
    }

    /// Whether either endpoint is the given element
    pub fn touches(&self, id: &ElementId) -> bool {
        self.source == *id || self.target == *id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Clamp a strength into [0, 1]; NaN collapses to 0
pub fn clamp_strength(strength: f32) -> f32 {
    if strength.is_nan() {
        0.0
    } else {
        strength.clamp(0.0, 1.0)
    }
}
