//! Reasoning/embedding backend contract
//!
//! The memory engine consumes two capabilities:
//! - `Embedder::embed`: text → fixed-dimension vector
//! - `CompletionClient::complete`: messages → streamed completion
//!
//! A streamed completion is three signals: a channel of text chunks, a
//! one-shot token count and a one-shot error. The producer closes the
//! chunk channel before signalling completion; an error ends the stream.
//!
//! Two implementations live in the crate:
//! - `MockBackend`: scripted responses and deterministic embeddings (testing)
//! - `FastEmbedEmbedder` (feature `embeddings`): local embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Errors from the backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("backend not available: {0}")]
    Unavailable(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend rejected credentials")]
    Unauthorized,
    #[error("backend rate limit exceeded")]
    RateLimited,
    #[error("backend returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("model error: {0}")]
    Model(String),
    #[error("backend returned no result")]
    EmptyResult,
}

/// Chat role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Receiving half of a streamed completion.
#[derive(Debug)]
pub struct Completion {
    pub chunks: mpsc::Receiver<String>,
    pub tokens: oneshot::Receiver<u64>,
    pub error: oneshot::Receiver<LlmError>,
}

/// Sending half handed to a producer.
#[derive(Debug)]
pub struct CompletionSender {
    pub chunks: mpsc::Sender<String>,
    pub tokens: oneshot::Sender<u64>,
    pub error: oneshot::Sender<LlmError>,
}

impl Completion {
    /// Create a connected sender/receiver pair with the given chunk buffer.
    pub fn channel(buffer: usize) -> (CompletionSender, Completion) {
        let (chunk_tx, chunk_rx) = mpsc::channel(buffer.max(1));
        let (token_tx, token_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        (
            CompletionSender {
                chunks: chunk_tx,
                tokens: token_tx,
                error: error_tx,
            },
            Completion {
                chunks: chunk_rx,
                tokens: token_rx,
                error: error_rx,
            },
        )
    }
}

/// Fully drained completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutput {
    pub text: String,
    /// Token count if the producer reported one
    pub tokens: Option<u64>,
}

impl Completion {
    /// Drain every chunk, then read the token count and the error signal.
    ///
    /// A dropped token or error sender counts as "not reported".
    pub async fn collect(mut self) -> Result<CompletionOutput, LlmError> {
        let mut text = String::new();
        while let Some(chunk) = self.chunks.recv().await {
            text.push_str(&chunk);
        }
        let tokens = self.tokens.await.ok();
        if let Ok(err) = self.error.await {
            return Err(err);
        }
        Ok(CompletionOutput { text, tokens })
    }
}

/// Text → vector capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Messages → streamed completion capability.
///
/// Abstracts over transport (HTTP, local model, mock) so the pipelines
/// don't depend on how the backend is reached.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError>;
}

/// Dimension of vectors produced by `MockBackend::hashed_embedding`.
pub const MOCK_EMBEDDING_DIMENSIONS: usize = 32;

/// Scripted backend for testing and offline use.
///
/// Completions are served from a FIFO queue; each response is streamed in
/// several chunks. Embeddings come from registered vectors or a
/// deterministic character-trigram hash, so identical text always embeds
/// identically and near-duplicates score high.
pub struct MockBackend {
    completions: Mutex<VecDeque<Result<String, LlmError>>>,
    vectors: HashMap<String, Vec<f32>>,
    embed_failure: Option<LlmError>,
    requests: Mutex<Vec<Vec<Message>>>,
    chunk_size: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            vectors: HashMap::new(),
            embed_failure: None,
            requests: Mutex::new(Vec::new()),
            chunk_size: 7,
        }
    }

    /// Queue a successful completion.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a completion that fails mid-stream.
    pub fn with_completion_error(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    /// Register a fixed vector for an exact text.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Make every embedding request fail.
    pub fn failing_embeddings(mut self, error: LlmError) -> Self {
        self.embed_failure = Some(error);
        self
    }

    /// Queue a completion after construction (e.g. behind an `Arc`).
    pub fn push(&self, response: Result<String, LlmError>) {
        if let Ok(mut queue) = self.completions.lock() {
            queue.push_back(response);
        }
    }

    /// Message sequences received so far, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Completions still queued.
    pub fn pending_completions(&self) -> usize {
        self.completions.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Deterministic embedding from character trigrams.
    pub fn hashed_embedding(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIMENSIONS];
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        if chars.is_empty() {
            return vector;
        }
        for window in chars.windows(3.min(chars.len())) {
            // FNV-1a over the window
            let mut hash: u32 = 0x811c_9dc5;
            for c in window {
                hash ^= *c as u32;
                hash = hash.wrapping_mul(0x0100_0193);
            }
            vector[(hash as usize) % MOCK_EMBEDDING_DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if let Some(err) = &self.embed_failure {
            return Err(err.clone());
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| Self::hashed_embedding(text)))
    }
}

#[async_trait]
impl CompletionClient for MockBackend {
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let next = self
            .completions
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or_else(|| LlmError::Unavailable("no scripted completion queued".to_string()))?;

        let (sender, completion) = Completion::channel(4);
        let chunk_size = self.chunk_size;
        tokio::spawn(async move {
            let CompletionSender {
                chunks,
                tokens,
                error,
            } = sender;
            match next {
                Ok(text) => {
                    let chars: Vec<char> = text.chars().collect();
                    for piece in chars.chunks(chunk_size) {
                        if chunks.send(piece.iter().collect()).await.is_err() {
                            return;
                        }
                    }
                    drop(chunks);
                    let _ = tokens.send(chars.len() as u64);
                }
                Err(err) => {
                    drop(chunks);
                    let _ = error.send(err);
                }
            }
        });
        Ok(completion)
    }
}
