//! Best-effort access recording on a bounded worker pool

use crate::config::RecorderConfig;
use crate::graph::ElementId;
use crate::storage::MemoryStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One access to fold into an element's statistics
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    pub element_id: ElementId,
    pub successful: bool,
    pub recall_time: f64,
    pub certaindex: f64,
}

/// Counters since the recorder started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecorderStats {
    pub submitted: u64,
    pub recorded: u64,
    /// Rejected because the queue was full or closed
    pub dropped: u64,
    /// Accepted but the store write failed
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    recorded: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Fire-and-forget access recording.
///
/// `submit` never blocks and never reports the outcome to the caller.
/// Records beyond the queue capacity are dropped with a warning; store
/// failures are logged and counted. Must be created inside a tokio runtime.
pub struct AccessRecorder {
    sender: RwLock<Option<mpsc::Sender<AccessRecord>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl AccessRecorder {
    pub fn spawn(store: Arc<dyn MemoryStore>, config: &RecorderConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                Self::spawn_worker(
                    worker,
                    Arc::clone(&store),
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                )
            })
            .collect();

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    fn spawn_worker(
        worker: usize,
        store: Arc<dyn MemoryStore>,
        receiver: Arc<Mutex<mpsc::Receiver<AccessRecord>>>,
        counters: Arc<Counters>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                // Hold the receiver only while waiting, not while writing
                let next = receiver.lock().await.recv().await;
                let Some(record) = next else {
                    break;
                };
                match store.record_access(
                    &record.element_id,
                    record.successful,
                    record.recall_time,
                    record.certaindex,
                ) {
                    Ok(_) => {
                        counters.recorded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(element = %record.element_id, error = %e, "access recording failed");
                    }
                }
            }
            debug!(worker, "access recorder worker stopped");
        })
    }

    /// Queue a record without waiting. Returns whether it was accepted.
    pub fn submit(&self, record: AccessRecord) -> bool {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let sender = match self.sender.read() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(element = %record.element_id, "access recorder closed, record dropped");
            return false;
        };
        match sender.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(element = %record.element_id, "access recorder queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(element = %record.element_id, "access recorder closed, record dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting records, drain the queue and wait for every worker.
    pub async fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            sender.take();
        }
        let handles: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}
