use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{PipelineConfig, ValidationError};

/// Storage backing for watermarks and landed batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Keep all state in memory. Useful for development and tests; state does
    /// not survive a restart.
    Memory,
}

/// Top-level configuration of the loader binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    /// The pipeline to run.
    pub pipeline: PipelineConfig,
    /// Where watermarks and landed batches are kept.
    #[serde(default = "default_storage")]
    pub storage: StorageConfig,
}

impl LoaderConfig {
    /// Validates the loader configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_storage() -> StorageConfig {
    StorageConfig::Memory
}
