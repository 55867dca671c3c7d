#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use config::shared::{CursorSpec, PipelineConfig, ScdMode, SourceTableConfig};
use lakeflow::alerts::MemoryAlertSink;
use lakeflow::pipeline::Pipeline;
use lakeflow::source::MemorySource;
use lakeflow::store::batch::MemoryBatchStore;
use lakeflow::store::watermark::MemoryWatermarkStore;
use lakeflow::types::{Cell, Cursor, TableName, TableRow, TableSchema};

/// Low-sentinel watermark used by every test pipeline.
pub fn epoch_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap()
}

/// Returns a timestamp at midnight UTC of the given day in January 2024.
pub fn january(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn orders_config() -> SourceTableConfig {
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

pub fn order_row(order_id: i64, status: &str, updated_at: DateTime<Utc>) -> TableRow {
    TableRow::new(vec![
        Cell::I64(order_id),
        Cell::String(status.to_string()),
        Cell::TimestampTz(updated_at),
    ])
}

pub fn customers_config() -> SourceTableConfig {
    SourceTableConfig {
        schema: "crm".to_string(),
        name: "customers".to_string(),
        cursor_column: "updated_at".to_string(),
        key_columns: vec!["customer_id".to_string()],
        tracked_columns: Some(vec!["name".to_string()]),
        scd_mode: ScdMode::Type2,
        backfill_from: None,
    }
}

pub fn customers_schema() -> Arc<TableSchema> {
    TableSchema::new(
        TableName::new("crm", "customers"),
        vec![
            "customer_id".to_string(),
            "name".to_string(),
            "updated_at".to_string(),
        ],
    )
}

pub fn customer_row(customer_id: i64, name: &str, updated_at: DateTime<Utc>) -> TableRow {
    TableRow::new(vec![
        Cell::I64(customer_id),
        Cell::String(name.to_string()),
        Cell::TimestampTz(updated_at),
    ])
}

pub fn events_config() -> SourceTableConfig {
    SourceTableConfig {
        schema: "sales".to_string(),
        name: "events".to_string(),
        cursor_column: "updated_at".to_string(),
        key_columns: vec!["event_id".to_string()],
        tracked_columns: None,
        scd_mode: ScdMode::Type1,
        backfill_from: None,
    }
}

pub fn events_schema() -> Arc<TableSchema> {
    TableSchema::new(
        TableName::new("sales", "events"),
        vec![
            "event_id".to_string(),
            "customer_id".to_string(),
            "amount".to_string(),
            "event_time".to_string(),
            "updated_at".to_string(),
        ],
    )
}

pub fn event_row(
    event_id: i64,
    customer_id: i64,
    amount: f64,
    event_time: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> TableRow {
    TableRow::new(vec![
        Cell::I64(event_id),
        Cell::I64(customer_id),
        Cell::F64(amount),
        Cell::TimestampTz(event_time),
        Cell::TimestampTz(updated_at),
    ])
}

pub fn pipeline_config(tables: Vec<SourceTableConfig>) -> PipelineConfig {
    PipelineConfig {
        id: rand::random(),
        initial_cursor: CursorSpec::Timestamp(epoch_floor()),
        poll_interval_ms: 10,
        tables,
    }
}

pub type TestPipeline =
    Pipeline<MemorySource, MemoryWatermarkStore, MemoryBatchStore, MemoryAlertSink>;

pub struct TestHarness {
    pub source: MemorySource,
    pub watermarks: MemoryWatermarkStore,
    pub batches: MemoryBatchStore,
    pub alerts: MemoryAlertSink,
    pub pipeline: TestPipeline,
}

/// Wires a pipeline over fresh memory stores for the given tables.
pub fn create_pipeline(tables: Vec<SourceTableConfig>) -> TestHarness {
    let source = MemorySource::new();
    let watermarks = MemoryWatermarkStore::new(Cursor::Timestamp(epoch_floor()));
    let batches = MemoryBatchStore::new();
    let alerts = MemoryAlertSink::new();

    let pipeline = Pipeline::new(
        pipeline_config(tables),
        source.clone(),
        watermarks.clone(),
        batches.clone(),
        alerts.clone(),
    )
    .expect("test pipeline configuration is valid");

    TestHarness {
        source,
        watermarks,
        batches,
        alerts,
        pipeline,
    }
}
