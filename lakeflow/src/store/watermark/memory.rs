use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;
use crate::store::watermark::base::{WatermarkRecord, WatermarkStore};
use crate::types::{Cursor, TableName};

/// Inner state of [`MemoryWatermarkStore`].
#[derive(Debug)]
struct Inner {
    /// Recorded cursor per table. Tables without an entry have never completed
    /// an extraction cycle.
    cursors: BTreeMap<TableName, Cursor>,
}

/// In-memory watermark store for testing and development purposes.
///
/// [`MemoryWatermarkStore`] keeps all cursors in memory; state is lost when
/// the process terminates unless exported with [`MemoryWatermarkStore::snapshot`]
/// and re-imported with [`MemoryWatermarkStore::restore`].
///
/// The single mutex serializes every read-modify-write, which satisfies the
/// per-table atomicity requirement of [`WatermarkStore::advance`].
#[derive(Debug, Clone)]
pub struct MemoryWatermarkStore {
    initial: Cursor,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWatermarkStore {
    /// Creates an empty store that answers `initial` for unrecorded tables.
    pub fn new(initial: Cursor) -> Self {
        let inner = Inner {
            cursors: BTreeMap::new(),
        };

        Self {
            initial,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the persisted form of the store, one record per table.
    pub async fn snapshot(&self) -> BTreeMap<TableName, WatermarkRecord> {
        let inner = self.inner.lock().await;

        inner
            .cursors
            .iter()
            .map(|(table, cursor)| {
                (
                    table.clone(),
                    WatermarkRecord {
                        cursor: cursor.clone(),
                    },
                )
            })
            .collect()
    }

    /// Replaces the store contents with previously persisted records.
    pub async fn restore(&self, records: BTreeMap<TableName, WatermarkRecord>) {
        let mut inner = self.inner.lock().await;

        inner.cursors = records
            .into_iter()
            .map(|(table, record)| (table, record.cursor))
            .collect();
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    async fn get(&self, table: &TableName) -> FlowResult<Cursor> {
        let inner = self.inner.lock().await;

        Ok(inner
            .cursors
            .get(table)
            .cloned()
            .unwrap_or_else(|| self.initial.clone()))
    }

    async fn advance(&self, table: &TableName, new_value: Cursor) -> FlowResult<Cursor> {
        // The lock is held across the whole read-modify-write so that
        // concurrent advances for the same table are serialized.
        let mut inner = self.inner.lock().await;

        if let Some(current) = inner.cursors.get(table)
            && new_value < *current
        {
            warn!(
                table = %table,
                current = %current,
                proposed = %new_value,
                "rejecting attempt to move watermark backward"
            );

            return Err(flow_error!(
                ErrorKind::StaleWatermark,
                "Watermark can only move forward",
                format!("table {table}: proposed {new_value} is behind current {current}")
            ));
        }

        debug!(table = %table, watermark = %new_value, "advancing watermark");
        inner.cursors.insert(table.clone(), new_value.clone());

        Ok(new_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryWatermarkStore {
        MemoryWatermarkStore::new(Cursor::Int(0))
    }

    fn orders() -> TableName {
        TableName::new("sales", "orders")
    }

    #[tokio::test]
    async fn unrecorded_table_answers_initial_cursor() {
        let store = store();

        assert_eq!(store.get(&orders()).await.unwrap(), Cursor::Int(0));
    }

    #[tokio::test]
    async fn advance_keeps_cursor_monotonic() {
        let store = store();

        store.advance(&orders(), Cursor::Int(10)).await.unwrap();
        store.advance(&orders(), Cursor::Int(10)).await.unwrap();
        store.advance(&orders(), Cursor::Int(25)).await.unwrap();

        let stale = store.advance(&orders(), Cursor::Int(24)).await;
        assert_eq!(stale.unwrap_err().kind(), ErrorKind::StaleWatermark);

        assert_eq!(store.get(&orders()).await.unwrap(), Cursor::Int(25));
    }

    #[tokio::test]
    async fn tables_advance_independently() {
        let store = store();
        let customers = TableName::new("sales", "customers");

        store.advance(&orders(), Cursor::Int(100)).await.unwrap();
        store.advance(&customers, Cursor::Int(7)).await.unwrap();

        assert_eq!(store.get(&orders()).await.unwrap(), Cursor::Int(100));
        assert_eq!(store.get(&customers).await.unwrap(), Cursor::Int(7));
    }

    #[tokio::test]
    async fn snapshot_roundtrips_through_serde() {
        let store = store();
        store.advance(&orders(), Cursor::Int(42)).await.unwrap();

        let snapshot = store.snapshot().await;
        let serialized = serde_json::to_string(&snapshot).unwrap();
        assert!(serialized.contains("\"cursor\":42"));

        let restored: BTreeMap<TableName, WatermarkRecord> =
            serde_json::from_str(&serialized).unwrap();
        let other = MemoryWatermarkStore::new(Cursor::Int(0));
        other.restore(restored).await;

        assert_eq!(other.get(&orders()).await.unwrap(), Cursor::Int(42));
    }
}
