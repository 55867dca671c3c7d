//! Shared configuration types for lakeflow pipelines.

mod loader;
mod pipeline;
mod table;

use thiserror::Error;

pub use loader::{LoaderConfig, StorageConfig};
pub use pipeline::PipelineConfig;
pub use table::{CursorSpec, ScdMode, SourceTableConfig};

/// Errors raised when validating configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value that violates its constraint.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
