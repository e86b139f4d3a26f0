//! Pipeline configuration
//!
//! Every threshold used by ingestion and enrichment, plus sizing for the
//! access recorder. Loaded from YAML; missing keys fall back to defaults.
//!
//! ```yaml
//! ingestion:
//!   similar_limit: 5
//!   min_similarity: 0.7
//! enrichment:
//!   max_depth: 2
//! recorder:
//!   workers: 4
//! ```

use crate::graph::EMBEDDING_SIMILARITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub ingestion: IngestionConfig,
    pub enrichment: EnrichmentConfig,
    pub recorder: RecorderConfig,
}

/// Linking of newly ingested elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Maximum number of similar elements to link
    pub similar_limit: usize,
    /// Minimum cosine similarity for a link
    pub min_similarity: f32,
    /// Strength of each created association
    pub initial_strength: f32,
    /// Pattern type of each created association
    pub pattern_type: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            similar_limit: 5,
            min_similarity: 0.7,
            initial_strength: 0.5,
            pattern_type: EMBEDDING_SIMILARITY.to_string(),
        }
    }
}

/// Recency + graph-proximity context expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Number of recent elements used as seeds
    pub recent_limit: usize,
    /// Neighbourhood depth around each seed
    pub max_depth: usize,
    /// Minimum association strength followed
    pub min_strength: f32,
    /// Certaindex reported for every returned element
    pub certaindex: f64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            recent_limit: 5,
            max_depth: 2,
            min_strength: 0.3,
            certaindex: 0.8,
        }
    }
}

/// Background access-recording pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub workers: usize,
    /// Pending records beyond this are dropped
    pub queue_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 256,
        }
    }
}

impl MemoryConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: MemoryConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("ingestion.min_similarity", self.ingestion.min_similarity as f64)?;
        unit_interval("ingestion.initial_strength", self.ingestion.initial_strength as f64)?;
        unit_interval("enrichment.min_strength", self.enrichment.min_strength as f64)?;
        unit_interval("enrichment.certaindex", self.enrichment.certaindex)?;
        if self.ingestion.pattern_type.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "ingestion.pattern_type must not be empty".to_string(),
            ));
        }
        if self.recorder.workers == 0 {
            return Err(ConfigError::Invalid("recorder.workers must be at least 1".to_string()));
        }
        if self.recorder.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "recorder.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}
