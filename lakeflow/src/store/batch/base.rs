use std::future::Future;

use crate::error::FlowResult;
use crate::types::{LandedBatch, TableName};

/// Trait for landing extracted batches in durable storage.
///
/// [`BatchStore`] implementations persist each batch under its
/// [`artifact name`], which encodes table and extraction timestamp. Consumers
/// discover the latest or all unprocessed batches through that naming scheme.
///
/// Writing a batch must be all-or-nothing: a batch is either durably stored
/// under its artifact name or not stored at all, since the caller advances the
/// table watermark only after a successful write.
///
/// [`artifact name`]: LandedBatch::artifact_name
pub trait BatchStore {
    /// Persists a batch and returns the artifact name it was stored under.
    ///
    /// Returns `None` without writing anything when the batch is empty; an
    /// empty extraction produces no artifact.
    fn write_batch(
        &self,
        batch: LandedBatch,
    ) -> impl Future<Output = FlowResult<Option<String>>> + Send;

    /// Returns all landed batches of a table in artifact-name order.
    ///
    /// Artifact names sort by extraction timestamp, so the returned batches
    /// are ordered oldest first.
    fn load_batches(
        &self,
        table: &TableName,
    ) -> impl Future<Output = FlowResult<Vec<LandedBatch>>> + Send;
}
