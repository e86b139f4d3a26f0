//! Memory pipelines
//!
//! `MemoryProcessor` ties a `MemoryStore` to the reasoning backend:
//! - ingestion (`process_input`): store input, link it to similar elements
//! - enrichment (`enrich_context`): recent elements plus their neighbourhood
//! - merge (`merge_elements`): fuse, verify, then rewrite the graph atomically

mod enrichment;
mod error;
mod locks;
mod merge;
mod processor;
mod prompts;
mod recorder;

pub use error::{MemoryError, MemoryResult};
pub use locks::{MergeLocks, PairGuard};
pub use merge::{MergeReport, MergeVerification};
pub use processor::{IngestReport, MemoryProcessor};
pub use prompts::strip_code_fence;
pub use recorder::{AccessRecord, AccessRecorder, RecorderStats};
