use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::shared::{CursorSpec, SourceTableConfig, ValidationError};

/// Top-level configuration for a lakeflow pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Unique identifier of the pipeline.
    pub id: u64,
    /// Low-sentinel cursor returned for tables with no recorded watermark.
    #[serde(default = "default_initial_cursor")]
    pub initial_cursor: CursorSpec,
    /// Delay between extraction cycles, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Source tables processed by this pipeline.
    pub tables: Vec<SourceTableConfig>,
}

impl PipelineConfig {
    /// Default delay between extraction cycles in milliseconds.
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;

    /// Validates pipeline configuration settings.
    ///
    /// Ensures at least one table is configured, every table is valid, and no
    /// table appears twice.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tables.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "pipeline.tables".to_string(),
                constraint: "must contain at least one table".to_string(),
            });
        }

        for (index, table) in self.tables.iter().enumerate() {
            table.validate()?;

            let qualified_name = table.qualified_name();
            if self.tables[..index]
                .iter()
                .any(|other| other.qualified_name() == qualified_name)
            {
                return Err(ValidationError::InvalidFieldValue {
                    field: "pipeline.tables".to_string(),
                    constraint: format!("table `{qualified_name}` is configured twice"),
                });
            }
        }

        Ok(())
    }
}

fn default_initial_cursor() -> CursorSpec {
    CursorSpec::Timestamp(DateTime::UNIX_EPOCH)
}

fn default_poll_interval_ms() -> u64 {
    PipelineConfig::DEFAULT_POLL_INTERVAL_MS
}
