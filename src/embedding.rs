//! Embedding helpers: vector similarity and the optional local embedder
//!
//! The `embeddings` feature adds `FastEmbedEmbedder`, an `Embedder`
//! backed by fastembed-rs (ONNX Runtime) for running without a remote
//! backend. Tests use the scripted mock in `llm`.

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use crate::llm::{Embedder, LlmError};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    /// Local embedder backed by fastembed (ONNX Runtime).
    ///
    /// `TextEmbedding::embed` needs `&mut self` and is CPU-bound, so the
    /// model sits behind a mutex and inference runs on the blocking pool.
    pub struct FastEmbedEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, LlmError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding =
                TextEmbedding::try_new(options).map_err(|e| LlmError::Model(e.to_string()))?;
            Ok(Self {
                model: Arc::new(Mutex::new(embedding)),
            })
        }

        /// nomic-embed-text-v1.5, 768 dimensions
        pub fn default_model() -> Result<Self, LlmError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            let model = Arc::clone(&self.model);
            let text = text.to_string();
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| LlmError::Model("embedding model lock poisoned".to_string()))?;
                let mut embeddings = model
                    .embed(vec![text], None)
                    .map_err(|e| LlmError::Model(e.to_string()))?;
                embeddings.pop().ok_or(LlmError::EmptyResult)
            })
            .await
            .map_err(|e| LlmError::Model(e.to_string()))?
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;
