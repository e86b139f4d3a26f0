//! Common test utilities for engram integration tests
//!
//! Store fixtures, scripted backends, a failure-injecting store and
//! seeded random graphs.

#![allow(dead_code)]

pub mod failing_store;
pub mod random_graph;

pub use failing_store::FailingLinks;
pub use random_graph::{RandomGraph, RandomGraphConfig};

use engram::{
    Association, Element, ElementType, MemoryConfig, MemoryProcessor, MemoryStore, MergeCandidate,
    MockBackend, OpenStore, SqliteStore,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Fresh in-memory store behind the trait object the processor takes
pub fn memory_store() -> Arc<dyn MemoryStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

/// Processor wired to one scripted backend for embeddings and completions
pub fn processor(
    store: &Arc<dyn MemoryStore>,
    backend: &Arc<MockBackend>,
    config: MemoryConfig,
) -> MemoryProcessor {
    MemoryProcessor::with_backend(Arc::clone(store), Arc::clone(backend), config)
}

pub fn concept(store: &Arc<dyn MemoryStore>, content: Value) -> Element {
    let element = Element::new(ElementType::Concept, content);
    store.create_element(&element).expect("create element");
    element
}

pub fn link(store: &Arc<dyn MemoryStore>, from: &Element, to: &Element, strength: f32) -> Association {
    let association = Association::new(from.id, to.id, "related", strength);
    store.create_association(&association).expect("create association");
    association
}

/// Two concepts joined by a 0.8 association and flagged as merge candidates
pub struct MergeScenario {
    pub a: Element,
    pub b: Element,
    pub link: Association,
}

pub fn merge_scenario(store: &Arc<dyn MemoryStore>) -> MergeScenario {
    let a = concept(store, json!({"name": "borrow checker", "area": "lifetimes"}));
    let b = concept(store, json!({"name": "borrowck", "area": "ownership"}));
    let link = link(store, &a, &b, 0.8);
    store
        .create_merge_candidate(&MergeCandidate::new(a.id, b.id).with_similarity(0.93))
        .expect("create candidate");
    MergeScenario { a, b, link }
}

/// Backend scripted with one fusion result and one verification verdict
pub fn scripted_merge(fused: &str, verdict: Value) -> Arc<MockBackend> {
    Arc::new(
        MockBackend::new()
            .with_completion(fused)
            .with_completion(verdict.to_string()),
    )
}
