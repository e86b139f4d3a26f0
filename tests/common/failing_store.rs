//! Store wrapper that fails association writes after a set number of calls

use engram::{
    AccessPattern, Association, AssociationId, CancellationToken, ConnectedElement, Cycle,
    Element, ElementId, ElementPair, GraphPath, MemoryStore, MergeCandidate, MergeOutcome,
    MergePlan, OpenStore, SimilarElement, SqliteStore, StorageError, StorageResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory SQLite store whose `create_association` fails on the Nth call
pub struct FailingLinks {
    inner: SqliteStore,
    fail_on: usize,
    calls: AtomicUsize,
}

impl FailingLinks {
    pub fn new(fail_on: usize) -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn association_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MemoryStore for FailingLinks {
    fn create_element(&self, element: &Element) -> StorageResult<()> {
        self.inner.create_element(element)
    }

    fn get_element(&self, id: &ElementId) -> StorageResult<Element> {
        self.inner.get_element(id)
    }

    fn update_element(&self, element: &Element) -> StorageResult<()> {
        self.inner.update_element(element)
    }

    fn delete_element(&self, id: &ElementId) -> StorageResult<()> {
        self.inner.delete_element(id)
    }

    fn get_recent_elements(&self, limit: usize) -> StorageResult<Vec<Element>> {
        self.inner.get_recent_elements(limit)
    }

    fn find_similar_elements(
        &self,
        embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StorageResult<Vec<SimilarElement>> {
        self.inner.find_similar_elements(embedding, limit, min_similarity)
    }

    fn create_association(&self, association: &Association) -> StorageResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.create_association(association)
    }

    fn get_association(&self, id: &AssociationId) -> StorageResult<Association> {
        self.inner.get_association(id)
    }

    fn update_association_strength(
        &self,
        id: &AssociationId,
        delta: f32,
        metadata: Option<&Value>,
    ) -> StorageResult<Association> {
        self.inner.update_association_strength(id, delta, metadata)
    }

    fn delete_association(&self, id: &AssociationId) -> StorageResult<()> {
        self.inner.delete_association(id)
    }

    fn associations_for(&self, id: &ElementId) -> StorageResult<Vec<Association>> {
        self.inner.associations_for(id)
    }

    fn count_associations(&self) -> StorageResult<usize> {
        self.inner.count_associations()
    }

    fn find_paths(
        &self,
        source: &ElementId,
        target: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<GraphPath>> {
        self.inner.find_paths(source, target, max_depth, min_strength)
    }

    fn detect_cycles(&self, id: &ElementId, max_depth: usize) -> StorageResult<Vec<Cycle>> {
        self.inner.detect_cycles(id, max_depth)
    }

    fn get_connected_elements(
        &self,
        id: &ElementId,
        max_depth: usize,
        min_strength: f32,
    ) -> StorageResult<Vec<ConnectedElement>> {
        self.inner.get_connected_elements(id, max_depth, min_strength)
    }

    fn record_access(
        &self,
        id: &ElementId,
        successful: bool,
        recall_time: f64,
        certaindex: f64,
    ) -> StorageResult<AccessPattern> {
        self.inner.record_access(id, successful, recall_time, certaindex)
    }

    fn get_access_pattern(&self, id: &ElementId) -> StorageResult<AccessPattern> {
        self.inner.get_access_pattern(id)
    }

    fn create_merge_candidate(&self, candidate: &MergeCandidate) -> StorageResult<()> {
        self.inner.create_merge_candidate(candidate)
    }

    fn get_merge_candidate(&self, pair: &ElementPair) -> StorageResult<MergeCandidate> {
        self.inner.get_merge_candidate(pair)
    }

    fn list_merge_candidates(&self) -> StorageResult<Vec<MergeCandidate>> {
        self.inner.list_merge_candidates()
    }

    fn annotate_merge_candidate(&self, pair: &ElementPair, metadata: &Value) -> StorageResult<()> {
        self.inner.annotate_merge_candidate(pair, metadata)
    }

    fn apply_merge(
        &self,
        plan: &MergePlan,
        cancel: &CancellationToken,
    ) -> StorageResult<MergeOutcome> {
        self.inner.apply_merge(plan, cancel)
    }
}
