use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::cursor::Cursor;
use crate::types::row::TableRow;
use crate::types::table::{TableName, TableSchema};

/// Timestamp format used in batch artifact names.
///
/// Zero-padded so that lexicographic ordering of artifact names follows
/// extraction time.
const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// A raw batch of rows extracted from a source table.
///
/// [`LandedBatch`] is immutable once written. A batch with zero rows is a
/// valid extraction outcome but produces no storage artifact.
#[derive(Debug, Clone)]
pub struct LandedBatch {
    /// The table the rows were extracted from.
    pub table: TableName,
    /// Column layout of the rows.
    pub schema: Arc<TableSchema>,
    /// Timestamp at which the extraction was performed.
    pub extracted_at: DateTime<Utc>,
    /// Extracted rows in source order.
    pub rows: Vec<TableRow>,
    /// Greatest cursor-column value observed in the batch.
    ///
    /// `None` for empty batches. This is the value proposed as the table's new
    /// watermark, never the wall-clock time.
    pub max_cursor: Option<Cursor>,
}

impl LandedBatch {
    /// Returns the number of rows in the batch.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the identifier under which the batch artifact is stored.
    ///
    /// The name encodes table and extraction timestamp as
    /// `<schema>.<table>_<extraction_timestamp>`, which lets consumers discover
    /// the latest or all unprocessed batches by name alone.
    pub fn artifact_name(&self) -> String {
        format!(
            "{}_{}",
            self.table,
            self.extracted_at.format(ARTIFACT_TIMESTAMP_FORMAT)
        )
    }
}
