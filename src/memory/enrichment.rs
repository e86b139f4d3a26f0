//! Context enrichment: recent elements expanded through the graph

use super::error::MemoryResult;
use super::processor::{checkpoint, MemoryProcessor};
use super::recorder::AccessRecord;
use crate::cancel::CancellationToken;
use crate::graph::ElementId;
use crate::query::ConnectedElement;
use std::collections::HashMap;
use tracing::debug;

impl MemoryProcessor {
    /// Blend recency with graph proximity.
    ///
    /// Seeds are the most recently created elements (depth 0). Each seed's
    /// undirected neighbourhood is added, keeping the smallest depth at
    /// which an element was found. Every returned element gets a
    /// fire-and-forget access record.
    ///
    /// Results are ordered by depth, then newest first, then ID.
    pub async fn enrich_context(
        &self,
        cancel: &CancellationToken,
    ) -> MemoryResult<Vec<ConnectedElement>> {
        checkpoint(cancel)?;
        let settings = &self.config.enrichment;
        let recent = self.store.get_recent_elements(settings.recent_limit)?;

        let mut found: HashMap<ElementId, ConnectedElement> = HashMap::new();
        let mut seeds = Vec::new();
        for element in recent {
            if found.contains_key(&element.id) {
                continue;
            }
            seeds.push(element.id);
            found.insert(element.id, ConnectedElement { element, depth: 0 });
        }

        for seed in &seeds {
            checkpoint(cancel)?;
            let connected =
                self.store
                    .get_connected_elements(seed, settings.max_depth, settings.min_strength)?;
            for hit in connected {
                match found.get_mut(&hit.element.id) {
                    Some(existing) if existing.depth <= hit.depth => {}
                    Some(existing) => *existing = hit,
                    None => {
                        found.insert(hit.element.id, hit);
                    }
                }
            }
        }

        let mut context: Vec<ConnectedElement> = found.into_values().collect();
        context.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| b.element.created_at.cmp(&a.element.created_at))
                .then_with(|| a.element.id.cmp(&b.element.id))
        });

        for item in &context {
            self.recorder.submit(AccessRecord {
                element_id: item.element.id,
                successful: true,
                recall_time: 0.0,
                certaindex: settings.certaindex,
            });
        }

        debug!(seeds = seeds.len(), total = context.len(), "context enriched");
        Ok(context)
    }
}
