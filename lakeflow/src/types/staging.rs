use chrono::{DateTime, Utc};

use crate::types::cursor::Cursor;
use crate::types::key::BusinessKey;
use crate::types::row::TableRow;

/// One row per business key after deduplication.
///
/// [`StagingRecord`] is the contract between the deduplicator's output and the
/// merge engines' input: the business key, all source attributes, and the
/// extraction timestamp used as the tie-break source.
#[derive(Debug, Clone)]
pub struct StagingRecord {
    /// Business key of the surviving row.
    pub key: BusinessKey,
    /// All source attributes in table column order.
    pub row: TableRow,
    /// Extraction timestamp of the batch the surviving row came from.
    pub extracted_at: DateTime<Utc>,
    /// Cursor-column value of the surviving row.
    pub cursor: Cursor,
}
