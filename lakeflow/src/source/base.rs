use std::future::Future;
use std::sync::Arc;

use crate::error::FlowResult;
use crate::types::{Cursor, TableName, TableRow, TableSchema};

/// Bound applied to a table's cursor column during extraction.
///
/// Incremental extraction uses a strictly-greater bound so that the boundary
/// row of the previous run is never re-emitted; backfills use an inclusive
/// bound so that the explicit start value itself is reloaded.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorPredicate {
    /// `cursor_column > cursor`: incremental extraction from a stored watermark.
    GreaterThan(Cursor),
    /// `cursor_column >= cursor`: backfill from an explicit start value.
    AtLeast(Cursor),
}

impl CursorPredicate {
    /// Returns true when a cursor-column value satisfies the bound.
    pub fn matches(&self, value: &Cursor) -> bool {
        match self {
            CursorPredicate::GreaterThan(bound) => value > bound,
            CursorPredicate::AtLeast(bound) => value >= bound,
        }
    }
}

/// Trait for systems that can answer bounded range queries over source tables.
///
/// [`SourceReader`] implementations execute the extraction predicate against
/// the source and return only qualifying rows. Failures must surface as
/// [`ErrorKind::SourceUnavailable`] so that callers retry the whole extraction
/// without advancing the table watermark.
///
/// [`ErrorKind::SourceUnavailable`]: crate::error::ErrorKind::SourceUnavailable
pub trait SourceReader {
    /// Returns the column layout of a source table.
    fn table_schema(
        &self,
        table: &TableName,
    ) -> impl Future<Output = FlowResult<Arc<TableSchema>>> + Send;

    /// Returns the rows of `table` whose `cursor_column` value satisfies the
    /// predicate, in source order.
    fn fetch_rows(
        &self,
        table: &TableName,
        cursor_column: &str,
        predicate: &CursorPredicate,
    ) -> impl Future<Output = FlowResult<Vec<TableRow>>> + Send;
}
