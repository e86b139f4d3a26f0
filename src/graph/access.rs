//! Per-element usage statistics

use super::element::ElementId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Usage statistics for one element.
///
/// Written by best-effort recording; readers must tolerate lagging values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPattern {
    pub id: Uuid,
    pub element_id: ElementId,
    pub access_count: u64,
    pub successful_recalls: u64,
    /// Running mean of reported recall times
    pub avg_recall_time: f64,
    /// Running mean of reported confidence scores
    pub certaindex: f64,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessPattern {
    /// Statistics for an element's first recorded access
    pub fn first(element_id: ElementId, successful: bool, recall_time: f64, certaindex: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            element_id,
            access_count: 1,
            successful_recalls: u64::from(successful),
            avg_recall_time: recall_time,
            certaindex,
            last_accessed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one more access into the statistics
    pub fn record(&mut self, successful: bool, recall_time: f64, certaindex: f64) {
        let previous = self.access_count as f64;
        self.access_count += 1;
        if successful {
            self.successful_recalls += 1;
        }
        let count = self.access_count as f64;
        self.avg_recall_time = (self.avg_recall_time * previous + recall_time) / count;
        self.certaindex = (self.certaindex * previous + certaindex) / count;

        let now = Utc::now();
        self.last_accessed_at = now;
        self.updated_at = now;
    }

    /// Fraction of accesses that were successful recalls
    pub fn success_rate(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            self.successful_recalls as f64 / self.access_count as f64
        }
    }
}
