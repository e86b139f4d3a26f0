//! Per-element advisory locks serializing merges that share a participant

use crate::graph::{ElementId, ElementPair};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by element ID.
///
/// A merge of (A, B) holds both locks from before the first fetch until
/// after commit or rollback. Locks are taken in canonical ID order, so two
/// merges sharing a participant cannot deadlock.
#[derive(Debug, Default)]
pub struct MergeLocks {
    locks: DashMap<ElementId, Arc<Mutex<()>>>,
}

/// Guards for both participants of one merge
#[derive(Debug)]
pub struct PairGuard {
    pair: ElementPair,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PairGuard {
    pub fn pair(&self) -> ElementPair {
        self.pair
    }
}

impl MergeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: ElementId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for both elements of the pair
    pub async fn acquire(&self, pair: ElementPair) -> PairGuard {
        let mut guards = Vec::with_capacity(2);
        guards.push(self.slot(pair.first()).lock_owned().await);
        if !pair.is_degenerate() {
            guards.push(self.slot(pair.second()).lock_owned().await);
        }
        PairGuard {
            pair,
            _guards: guards,
        }
    }

    /// Drop lock entries nobody holds or waits on
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
