//! Deduplication of landed batches into staging records.
//!
//! Collapses a batch (or union of batches) to one row per business key using
//! a deterministic tie-break, so that downstream merges see exactly one
//! version of every entity.

use std::collections::HashMap;

use config::shared::SourceTableConfig;

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;
use crate::types::{BusinessKey, Cursor, LandedBatch, StagingRecord, TableName};

/// Collapses staging records to one record per business key.
///
/// Within a group, the surviving record is the one with the greatest
/// extraction-batch timestamp, then the largest cursor-column value, then
/// first-seen input order. The function is pure: invoking it repeatedly on the
/// same input yields the same output without accumulating state.
///
/// The output preserves the first-seen order of surviving keys.
pub fn dedupe(records: Vec<StagingRecord>) -> Vec<StagingRecord> {
    let mut survivors: Vec<StagingRecord> = Vec::new();
    let mut by_key: HashMap<BusinessKey, usize> = HashMap::new();

    for record in records {
        match by_key.get(&record.key) {
            None => {
                by_key.insert(record.key.clone(), survivors.len());
                survivors.push(record);
            }
            Some(&index) => {
                let incumbent = &survivors[index];
                let candidate_rank = (record.extracted_at, &record.cursor);
                let incumbent_rank = (incumbent.extracted_at, &incumbent.cursor);

                // Strictly greater wins; ties keep the first-seen record.
                if candidate_rank > incumbent_rank {
                    survivors[index] = record;
                }
            }
        }
    }

    survivors
}

/// Turns the union of landed batches into deduplicated staging records.
///
/// Each row contributes its business key, its cursor-column value, and the
/// extraction timestamp of the batch it arrived in; the combined set is then
/// collapsed with [`dedupe`].
pub fn dedupe_batches(
    batches: &[LandedBatch],
    table: &SourceTableConfig,
) -> FlowResult<Vec<StagingRecord>> {
    let table_name = TableName::from(table);
    let mut records = Vec::new();

    for batch in batches {
        let key_indices = resolve_columns(batch, &table.key_columns, &table_name)?;
        let cursor_index = resolve_columns(
            batch,
            std::slice::from_ref(&table.cursor_column),
            &table_name,
        )?[0];

        for row in &batch.rows {
            let key = BusinessKey::from_row(row, &key_indices);
            let cursor = Cursor::from_cell(&row.values()[cursor_index])?;

            records.push(StagingRecord {
                key,
                row: row.clone(),
                extracted_at: batch.extracted_at,
                cursor,
            });
        }
    }

    Ok(dedupe(records))
}

/// Resolves column names against a batch's schema.
fn resolve_columns(
    batch: &LandedBatch,
    columns: &[String],
    table: &TableName,
) -> FlowResult<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            batch.schema.column_index(column).ok_or_else(|| {
                flow_error!(
                    ErrorKind::SourceSchemaError,
                    "Column not found in landed batch schema",
                    format!("table {table} has no column `{column}`")
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::types::{Cell, TableRow};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn record(id: i64, name: &str, day: u32, cursor: i64) -> StagingRecord {
        StagingRecord {
            key: BusinessKey::new(vec![Cell::I64(id)]),
            row: TableRow::new(vec![
                Cell::I64(id),
                Cell::String(name.to_string()),
                Cell::I64(cursor),
            ]),
            extracted_at: at(day),
            cursor: Cursor::Int(cursor),
        }
    }

    #[test]
    fn later_extraction_timestamp_wins() {
        let survivors = dedupe(vec![record(1, "old", 1, 10), record(1, "new", 2, 5)]);

        assert_eq!(survivors.len(), 1);
        assert_eq!(
            survivors[0].row.values()[1],
            Cell::String("new".to_string())
        );
    }

    #[test]
    fn larger_cursor_breaks_timestamp_ties() {
        let survivors = dedupe(vec![record(1, "low", 1, 5), record(1, "high", 1, 10)]);

        assert_eq!(survivors.len(), 1);
        assert_eq!(
            survivors[0].row.values()[1],
            Cell::String("high".to_string())
        );
    }

    #[test]
    fn full_ties_keep_the_first_seen_record() {
        let survivors = dedupe(vec![record(1, "first", 1, 5), record(1, "second", 1, 5)]);

        assert_eq!(survivors.len(), 1);
        assert_eq!(
            survivors[0].row.values()[1],
            Cell::String("first".to_string())
        );
    }

    #[test]
    fn distinct_keys_all_survive_in_first_seen_order() {
        let survivors = dedupe(vec![
            record(2, "b", 1, 1),
            record(1, "a", 1, 2),
            record(3, "c", 1, 3),
        ]);

        let keys: Vec<_> = survivors
            .iter()
            .map(|r| r.key.values()[0].clone())
            .collect();
        assert_eq!(keys, vec![Cell::I64(2), Cell::I64(1), Cell::I64(3)]);
    }

    #[test]
    fn dedupe_is_reproducible_across_row_orders() {
        let forward = dedupe(vec![
            record(1, "old", 1, 1),
            record(1, "new", 2, 2),
            record(2, "only", 1, 1),
        ]);
        let reversed = dedupe(vec![
            record(2, "only", 1, 1),
            record(1, "new", 2, 2),
            record(1, "old", 1, 1),
        ]);

        assert_eq!(forward.len(), reversed.len());
        for survivor in &forward {
            let twin = reversed
                .iter()
                .find(|other| other.key == survivor.key)
                .unwrap();
            assert_eq!(twin.row, survivor.row);
            assert_eq!(twin.extracted_at, survivor.extracted_at);
        }
    }
}
