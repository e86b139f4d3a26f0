//! The memory processor: entry point for ingestion, enrichment and merge

use super::error::{MemoryError, MemoryResult};
use super::locks::MergeLocks;
use super::recorder::{AccessRecorder, RecorderStats};
use crate::cancel::CancellationToken;
use crate::config::MemoryConfig;
use crate::graph::{Association, Element, ElementType};
use crate::llm::{CompletionClient, Embedder};
use crate::storage::MemoryStore;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of ingesting one input
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The stored element
    pub element: Element,
    /// Associations created from it to similar elements
    pub links: Vec<Association>,
}

/// Runs the memory pipelines against a store and a reasoning backend.
///
/// Each operation runs within the caller's request. The only detached
/// work is access recording, which goes to a bounded worker pool.
/// Must be created inside a tokio runtime.
pub struct MemoryProcessor {
    pub(super) store: Arc<dyn MemoryStore>,
    pub(super) embedder: Arc<dyn Embedder>,
    pub(super) completion: Arc<dyn CompletionClient>,
    pub(super) config: MemoryConfig,
    pub(super) recorder: AccessRecorder,
    pub(super) locks: MergeLocks,
}

impl MemoryProcessor {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionClient>,
        config: MemoryConfig,
    ) -> Self {
        let recorder = AccessRecorder::spawn(Arc::clone(&store), &config.recorder);
        Self {
            store,
            embedder,
            completion,
            config,
            recorder,
            locks: MergeLocks::new(),
        }
    }

    /// Use one backend for both embeddings and completions
    pub fn with_backend<B>(store: Arc<dyn MemoryStore>, backend: Arc<B>, config: MemoryConfig) -> Self
    where
        B: Embedder + CompletionClient + 'static,
    {
        let embedder: Arc<dyn Embedder> = backend.clone();
        let completion: Arc<dyn CompletionClient> = backend;
        Self::new(store, embedder, completion, config)
    }

    pub fn recorder_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    /// Store raw input as a context element and link it to similar elements.
    ///
    /// Input that parses as JSON is stored as-is; anything else is stored as
    /// a JSON string. Not atomic: on error, whatever was already written
    /// (the element, some of the links) stays.
    pub async fn process_input(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<IngestReport> {
        checkpoint(cancel)?;
        let content = serde_json::from_str::<Value>(input)
            .unwrap_or_else(|_| Value::String(input.to_string()));

        let embedding = until_cancelled(cancel, async {
            self.embedder.embed(input).await.map_err(MemoryError::from)
        })
        .await?;
        let element = Element::new(ElementType::Context, content).with_embedding(embedding);

        checkpoint(cancel)?;
        self.store.create_element(&element)?;
        debug!(element = %element.id, "ingested element stored");

        let settings = &self.config.ingestion;
        let embedding = element.embedding.as_deref().unwrap_or_default();
        // One extra so the new element itself can be skipped
        let similar = self.store.find_similar_elements(
            embedding,
            settings.similar_limit.saturating_add(1),
            settings.min_similarity,
        )?;

        let mut links = Vec::new();
        for found in similar
            .into_iter()
            .filter(|s| s.element.id != element.id)
            .take(settings.similar_limit)
        {
            checkpoint(cancel)?;
            let link = Association::new(
                element.id,
                found.element.id,
                settings.pattern_type.clone(),
                settings.initial_strength,
            )
            .with_metadata(json!({ "similarity": found.similarity }));
            self.store.create_association(&link)?;
            links.push(link);
        }

        info!(element = %element.id, links = links.len(), "input ingested");
        Ok(IngestReport { element, links })
    }

    /// Stop the access recorder after draining queued records
    pub async fn shutdown(&self) {
        self.recorder.shutdown().await;
    }
}

/// Fail with `Cancelled` once the token is set
pub(super) fn checkpoint(cancel: &CancellationToken) -> MemoryResult<()> {
    if cancel.is_cancelled() {
        Err(MemoryError::Cancelled)
    } else {
        Ok(())
    }
}

/// Race a collaborator call against cancellation
pub(super) async fn until_cancelled<T, F>(cancel: &CancellationToken, work: F) -> MemoryResult<T>
where
    F: Future<Output = MemoryResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MemoryError::Cancelled),
        result = work => result,
    }
}
