//! Storage trait definitions

use crate::cancel::CancellationToken;
use crate::graph::{
    AccessPattern, Association, AssociationId, Element, ElementId, ElementPair, MergeCandidate,
};
use crate::query::{ConnectedElement, Cycle, GraphPath};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Association not found: {0}")]
    AssociationNotFound(String),

    #[error("Access pattern not found for element: {0}")]
    AccessPatternNotFound(String),

    #[error("Merge candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid embedding blob: {0}")]
    InvalidEmbedding(String),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,

    #[error("Operation cancelled")]
    Cancelled,

    /// A merge participant was already merged into another element
    #[error("Merge conflict: {0}")]
    Conflict(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ElementNotFound(_)
                | StorageError::AssociationNotFound(_)
                | StorageError::AccessPatternNotFound(_)
                | StorageError::CandidateNotFound(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// An element returned by similarity search
#[derive(Debug, Clone)]
pub struct SimilarElement {
    pub element: Element,
    /// Cosine similarity to the query vector
    pub similarity: f32,
}

/// Everything the store needs to commit a verified merge atomically
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// The two elements being superseded
    pub pair: ElementPair,
    /// The new element; persisted inside the merge transaction
    pub merged: Element,
    pub merged_at: DateTime<Utc>,
}

/// What a committed merge changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Association endpoints rewritten to the merged element
    pub redirected_sources: usize,
    pub redirected_targets: usize,
    /// Elements that received a tombstone annotation
    pub tombstoned: usize,
}

/// Trait for graph storage backends
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent access from multiple tasks.
pub trait MemoryStore: Send + Sync {
    // === Element Operations ===

    /// Insert a new element
    fn create_element(&self, element: &Element) -> StorageResult<()>;

    /// Load an element by ID; `ElementNotFound` when absent
    fn get_element(&self, id: &ElementId) -> StorageResult<Element>;

    /// Replace type, content and embedding; `ElementNotFound` when absent
    fn update_element(&self, element: &Element) -> StorageResult<()>;

    /// Delete an element and every association touching it
    fn delete_element(&self, id: &ElementId) -> StorageResult<()>;

    /// Most recently created elements, newest first
    fn get_recent_elements(&self, limit: usize) -> StorageResult<Vec<Element>>;

    /// Elements whose cosine similarity to `embedding` is >= `min_similarity`,
    /// best match first
    fn find_similar_elements(
        &self,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StorageResult<Vec<SimilarElement>>;

    // === Association Operations ===

    /// Insert a new association; parallel edges are allowed
    fn create_association(&self, association: &Association) -> StorageResult<()>;

    fn get_association(&self, id: &AssociationId) -> StorageResult<Association>;

    /// Add `delta` to the strength (clamped to [0, 1]) and concatenate
    /// `metadata` onto the existing metadata
    fn update_association_strength(
        &self,
        id: &AssociationId,
        delta: f32,
        metadata: Option<&Value>,
    ) -> StorageResult<Association>;

    fn delete_association(&self, id: &AssociationId) -> StorageResult<()>;

    /// Associations where the element is source or target
    fn associations_for(&self, id: &ElementId) -> StorageResult<Vec<Association>>;

    fn count_associations(&self) -> StorageResult<usize>;

    // === Graph Queries ===

    /// Every simple path source -> target of at most `max_depth` hops over
    /// associations with strength >= `min_strength`
    fn find_paths(
        &self,
        source: &ElementId,
        target: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<GraphPath>>;

    /// Closed walks through `id` of at most `max_depth` hops
    fn detect_cycles(&self, id: &ElementId, max_depth: usize) -> StorageResult<Vec<Cycle>>;

    /// Elements within `max_depth` undirected hops, with minimum depth
    fn get_connected_elements(
        &self,
        id: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<ConnectedElement>>;

    // === Access Patterns ===

    /// Fold one access into the element's statistics, creating them on first use
    fn record_access(
        &self,
        id: &ElementId,
        successful: bool,
        recall_time: f64,
        certaindex: f64,
    ) -> StorageResult<AccessPattern>;

    fn get_access_pattern(&self, id: &ElementId) -> StorageResult<AccessPattern>;

    // === Merge Candidates ===

    fn create_merge_candidate(&self, candidate: &MergeCandidate) -> StorageResult<()>;

    fn get_merge_candidate(&self, pair: &ElementPair) -> StorageResult<MergeCandidate>;

    fn list_merge_candidates(&self) -> StorageResult<Vec<MergeCandidate>>;

    /// Concatenate `metadata` onto the candidate's metadata
    fn annotate_merge_candidate(&self, pair: &ElementPair, metadata: &Value) -> StorageResult<()>;

    /// Commit a verified merge in one transaction: persist the merged
    /// element, redirect associations, tombstone both originals and delete
    /// the candidate. Rolls back on any error or on cancellation.
    fn apply_merge(&self, plan: &MergePlan, cancel: &CancellationToken)
        -> StorageResult<MergeOutcome>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: MemoryStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
