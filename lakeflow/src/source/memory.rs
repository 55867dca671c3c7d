use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;
use crate::source::base::{CursorPredicate, SourceReader};
use crate::types::{Cursor, TableName, TableRow, TableSchema};

/// A seeded source table.
#[derive(Debug)]
struct MemoryTable {
    schema: Arc<TableSchema>,
    rows: Vec<TableRow>,
}

/// Inner state of [`MemorySource`].
#[derive(Debug)]
struct Inner {
    tables: HashMap<TableName, MemoryTable>,
    /// When set, every query fails as if the source were unreachable.
    unavailable: bool,
}

/// In-memory source for testing and development purposes.
///
/// [`MemorySource`] answers bounded range queries over seeded rows, making it
/// ideal for exercising extraction behavior without a live source system. The
/// [`MemorySource::set_unavailable`] toggle simulates connectivity failures.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    /// Creates a new empty source.
    pub fn new() -> Self {
        let inner = Inner {
            tables: HashMap::new(),
            unavailable: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Registers a table with the given schema and no rows.
    pub async fn add_table(&self, schema: Arc<TableSchema>) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(
            schema.table.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );
    }

    /// Appends rows to a previously registered table.
    ///
    /// Rows for unknown tables are dropped silently, mirroring a writer that
    /// targets a table outside the replicated set.
    pub async fn push_rows(&self, table: &TableName, rows: Vec<TableRow>) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.tables.get_mut(table) {
            entry.rows.extend(rows);
        }
    }

    /// Simulates the source becoming unreachable (or reachable again).
    pub async fn set_unavailable(&self, unavailable: bool) {
        let mut inner = self.inner.lock().await;
        inner.unavailable = unavailable;
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for MemorySource {
    async fn table_schema(&self, table: &TableName) -> FlowResult<Arc<TableSchema>> {
        let inner = self.inner.lock().await;

        if inner.unavailable {
            return Err(unavailable_error(table));
        }

        inner
            .tables
            .get(table)
            .map(|entry| entry.schema.clone())
            .ok_or_else(|| {
                flow_error!(
                    ErrorKind::SourceSchemaError,
                    "Table is not known to the source",
                    format!("table {table} has not been registered")
                )
            })
    }

    async fn fetch_rows(
        &self,
        table: &TableName,
        cursor_column: &str,
        predicate: &CursorPredicate,
    ) -> FlowResult<Vec<TableRow>> {
        let inner = self.inner.lock().await;

        if inner.unavailable {
            return Err(unavailable_error(table));
        }

        let Some(entry) = inner.tables.get(table) else {
            return Err(unavailable_error(table));
        };

        let cursor_index = entry.schema.column_index(cursor_column).ok_or_else(|| {
            flow_error!(
                ErrorKind::SourceSchemaError,
                "Cursor column not found in source schema",
                format!("table {table} has no column `{cursor_column}`")
            )
        })?;

        let mut qualifying = Vec::new();
        for row in &entry.rows {
            let value = Cursor::from_cell(&row.values()[cursor_index])?;
            if predicate.matches(&value) {
                qualifying.push(row.clone());
            }
        }

        Ok(qualifying)
    }
}

fn unavailable_error(table: &TableName) -> crate::error::FlowError {
    flow_error!(
        ErrorKind::SourceUnavailable,
        "Source is unavailable",
        format!("query against {table} could not be executed")
    )
}
