use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::FlowResult;
use crate::types::{Cursor, TableName};

/// Persisted watermark state of a single table.
///
/// This is the wire shape of the store: one record per table, serialized as
/// `{ "cursor": <value> }`. An uninitialized table has no record and implies
/// the store's low-sentinel cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    /// Last-processed cursor value.
    pub cursor: Cursor,
}

/// Trait for persisting per-table extraction watermarks.
///
/// [`WatermarkStore`] implementations must serialize concurrent [`advance`]
/// calls for the same table so that the read-modify-write cycle never races;
/// different tables are fully independent and may update concurrently.
///
/// Callers must only invoke [`advance`] after the corresponding batch has been
/// durably persisted. If batch persistence fails the watermark must not move,
/// so a retried extraction re-reads the same cursor and is naturally
/// idempotent.
///
/// [`advance`]: WatermarkStore::advance
pub trait WatermarkStore {
    /// Returns the last-processed cursor value for a table.
    ///
    /// Returns the store's configured initial low-sentinel cursor when no
    /// value has been recorded yet.
    fn get(&self, table: &TableName) -> impl Future<Output = FlowResult<Cursor>> + Send;

    /// Advances the cursor of a table to `new_value`.
    ///
    /// Succeeds only when `new_value` is greater than or equal to the current
    /// value, keeping the stored cursor monotonically non-decreasing. Fails
    /// with [`ErrorKind::StaleWatermark`] otherwise; the rejection is logged
    /// and never silent.
    ///
    /// [`ErrorKind::StaleWatermark`]: crate::error::ErrorKind::StaleWatermark
    fn advance(
        &self,
        table: &TableName,
        new_value: Cursor,
    ) -> impl Future<Output = FlowResult<Cursor>> + Send;
}
