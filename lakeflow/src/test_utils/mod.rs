//! Shared fixtures for tests.
//!
//! Builders for a small `sales.orders` table used across unit tests. Enable
//! the `test-utils` feature to use them from downstream crates.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use config::shared::{ScdMode, SourceTableConfig};

use crate::types::{Cell, TableName, TableRow, TableSchema};

/// Returns a timestamp at midnight UTC of the given day in January 2024.
pub fn january(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

/// Returns the configuration of the `sales.orders` test table.
pub fn orders_table_config() -> SourceTableConfig {
    SourceTableConfig {
        schema: "sales".to_string(),
        name: "orders".to_string(),
        cursor_column: "updated_at".to_string(),
        key_columns: vec!["order_id".to_string()],
        tracked_columns: Some(vec!["status".to_string()]),
        scd_mode: ScdMode::Type2,
        backfill_from: None,
    }
}

/// Returns the schema of the `sales.orders` test table.
pub fn orders_schema() -> Arc<TableSchema> {
    TableSchema::new(
        TableName::new("sales", "orders"),
        vec![
            "order_id".to_string(),
            "status".to_string(),
            "updated_at".to_string(),
        ],
    )
}

/// Builds one `sales.orders` row.
pub fn order_row(order_id: i64, status: &str, updated_at: DateTime<Utc>) -> TableRow {
    TableRow::new(vec![
        Cell::I64(order_id),
        Cell::String(status.to_string()),
        Cell::TimestampTz(updated_at),
    ])
}
