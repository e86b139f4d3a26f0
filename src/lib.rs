//! Engram: associative memory engine
//!
//! A persistent, weighted, cyclic graph of knowledge fragments with
//! similarity-based retrieval, bounded multi-hop traversal and semantic
//! deduplication through a verified merge workflow.
//!
//! # Core Concepts
//!
//! - **Elements**: stored knowledge fragments (code, concept or context)
//!   with JSON content and an optional embedding
//! - **Associations**: directed edges with a strength in [0, 1]; traversal
//!   thresholds are inclusive
//! - **Merge candidates**: unordered pairs flagged for fusion; a merge
//!   redirects associations to the new element and tombstones the originals
//!
//! # Example
//!
//! ```
//! use engram::{Element, ElementType, MemoryStore, OpenStore, SqliteStore};
//! use serde_json::json;
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let element = Element::new(ElementType::Concept, json!({"topic": "ownership"}));
//! store.create_element(&element).unwrap();
//! assert_eq!(store.get_element(&element.id).unwrap().content["topic"], "ownership");
//! ```

pub mod cancel;
pub mod config;
pub mod embedding;
mod graph;
pub mod llm;
pub mod memory;
pub mod query;
pub mod storage;

pub use cancel::CancellationToken;
pub use config::{ConfigError, EnrichmentConfig, IngestionConfig, MemoryConfig, RecorderConfig};
pub use graph::{
    clamp_strength, concat_json, AccessPattern, Association, AssociationId, Element, ElementId,
    ElementPair, ElementType, MergeCandidate, UnknownElementType, EMBEDDING_SIMILARITY,
    MERGED_AT_KEY, MERGED_INTO_KEY,
};
pub use llm::{CompletionClient, Embedder, LlmError, Message, MockBackend, Role};
pub use memory::{
    IngestReport, MemoryError, MemoryProcessor, MemoryResult, MergeReport, MergeVerification,
};
pub use query::{ConnectedElement, Cycle, Direction, GraphPath};
pub use storage::{
    MemoryStore, MergeOutcome, MergePlan, OpenStore, SimilarElement, SqliteStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
