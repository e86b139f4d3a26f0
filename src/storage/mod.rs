//! Storage backends for the memory graph
//!
//! Backends implement the `MemoryStore` trait. The primary implementation
//! is `SqliteStore` for persistent storage.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    MemoryStore, MergeOutcome, MergePlan, OpenStore, SimilarElement, StorageError, StorageResult,
};
