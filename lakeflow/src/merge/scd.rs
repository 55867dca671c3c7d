use std::collections::HashSet;

use chrono::{DateTime, Utc};
use config::shared::ScdMode;
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, FlowResult};
use crate::merge::table::DimensionTable;
use crate::types::{BusinessKey, StagingRecord, TableRow};

/// Result of merging a single staged batch into a dimension table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeStats {
    /// Staging records processed.
    pub staged: usize,
    /// New business keys inserted (including new Type-2 versions).
    pub inserts: usize,
    /// Existing records whose attributes were rewritten in place.
    pub updates: usize,
    /// Type-2 versions closed by a newer version.
    pub versions_closed: usize,
    /// Records whose tracked attributes already matched the staged row.
    pub unchanged: usize,
}

/// A mutation computed during the planning phase of a merge.
///
/// Every action is validated before any of them is applied, which makes the
/// merge all-or-nothing per batch: a rejected batch leaves the dimension
/// table untouched.
#[derive(Debug)]
enum MergeAction {
    Insert {
        key: BusinessKey,
        row: TableRow,
        at: DateTime<Utc>,
    },
    Overwrite {
        index: usize,
        row: TableRow,
    },
    CloseAndInsert {
        index: usize,
        row: TableRow,
        at: DateTime<Utc>,
    },
}

/// Reconciles deduplicated staged rows into a historized dimension table.
///
/// Supports Type-1 (overwrite) and Type-2 (versioned) semantics, selected per
/// table through [`ScdMode`]. Re-applying an already-applied batch is a no-op,
/// and a batch older than the table's last applied timestamp is rejected with
/// [`ErrorKind::OutOfOrderBatch`] since applying it would violate the
/// non-overlapping-interval invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScdMerger;

impl ScdMerger {
    /// Creates a new merger.
    pub fn new() -> Self {
        Self
    }

    /// Merges staged records into `dimension` using the given mode.
    ///
    /// The input must already be deduplicated to one record per business key;
    /// duplicate keys are rejected with [`ErrorKind::InvalidData`]. The merge
    /// either applies completely or not at all.
    pub fn merge(
        &self,
        dimension: &mut DimensionTable,
        staging: &[StagingRecord],
        mode: ScdMode,
    ) -> FlowResult<MergeStats> {
        let mut stats = MergeStats {
            staged: staging.len(),
            ..MergeStats::default()
        };

        let Some(batch_at) = staging.iter().map(|record| record.extracted_at).max() else {
            return Ok(stats);
        };

        if let Some(last_applied) = dimension.last_applied_at()
            && batch_at < last_applied
        {
            warn!(
                table = %dimension.name(),
                batch_at = %batch_at,
                last_applied = %last_applied,
                "rejecting out-of-order batch"
            );

            bail!(
                ErrorKind::OutOfOrderBatch,
                "Batch is older than the dimension's last applied batch",
                format!(
                    "table {}: batch {batch_at} arrived after {last_applied} was applied",
                    dimension.name()
                )
            );
        }

        // Planning phase: validate the whole batch and decide every mutation
        // before touching the table.
        let mut seen: HashSet<&BusinessKey> = HashSet::new();
        let mut actions = Vec::new();

        for record in staging {
            if !seen.insert(&record.key) {
                bail!(
                    ErrorKind::InvalidData,
                    "Staging records must hold one row per business key",
                    format!(
                        "table {}: key {} appears more than once",
                        dimension.name(),
                        record.key
                    )
                );
            }

            let Some(index) = dimension.current_index(&record.key) else {
                actions.push(MergeAction::Insert {
                    key: record.key.clone(),
                    row: record.row.clone(),
                    at: record.extracted_at,
                });
                continue;
            };

            match mode {
                ScdMode::Type1 => {
                    if dimension.attributes_differ(index, &record.row) {
                        actions.push(MergeAction::Overwrite {
                            index,
                            row: record.row.clone(),
                        });
                    } else {
                        stats.unchanged += 1;
                    }
                }
                ScdMode::Type2 => {
                    if !dimension.tracked_differs(index, &record.row) {
                        // Idempotent re-application of an already-applied
                        // batch; non-tracked attributes never trigger a
                        // version.
                        stats.unchanged += 1;
                        continue;
                    }

                    let effective_from = dimension.records()[index].effective_from;
                    if record.extracted_at < effective_from {
                        bail!(
                            ErrorKind::OutOfOrderBatch,
                            "Staged record is older than the current dimension version",
                            format!(
                                "table {}: key {} staged at {} behind version effective from {}",
                                dimension.name(),
                                record.key,
                                record.extracted_at,
                                effective_from
                            )
                        );
                    }

                    if record.extracted_at == effective_from {
                        // Same-timestamp correction: amend the version in
                        // place instead of chaining a zero-length interval.
                        actions.push(MergeAction::Overwrite {
                            index,
                            row: record.row.clone(),
                        });
                    } else {
                        actions.push(MergeAction::CloseAndInsert {
                            index,
                            row: record.row.clone(),
                            at: record.extracted_at,
                        });
                    }
                }
            }
        }

        // Apply phase: nothing below can fail.
        for action in actions {
            match action {
                MergeAction::Insert { key, row, at } => {
                    dimension.insert_new(key, row, at);
                    stats.inserts += 1;
                }
                MergeAction::Overwrite { index, row } => {
                    dimension.overwrite_attributes(index, row);
                    stats.updates += 1;
                }
                MergeAction::CloseAndInsert { index, row, at } => {
                    dimension.close_and_insert(index, row, at);
                    stats.versions_closed += 1;
                    stats.inserts += 1;
                }
            }
        }

        dimension.mark_applied(batch_at);

        info!(
            table = %dimension.name(),
            mode = %mode,
            staged = stats.staged,
            inserts = stats.inserts,
            updates = stats.updates,
            versions_closed = stats.versions_closed,
            unchanged = stats.unchanged,
            "merge applied"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    use config::shared::SourceTableConfig;

    use crate::types::{Cell, Cursor, TableName, TableRow, TableSchema};

    fn customers_config() -> SourceTableConfig {
        SourceTableConfig {
            schema: "crm".to_string(),
            name: "customers".to_string(),
            cursor_column: "updated_at".to_string(),
            key_columns: vec!["customer_id".to_string()],
            tracked_columns: Some(vec!["name".to_string(), "tier".to_string()]),
            scd_mode: ScdMode::Type2,
            backfill_from: None,
        }
    }

    fn customers_schema() -> Arc<TableSchema> {
        TableSchema::new(
            TableName::new("crm", "customers"),
            vec![
                "customer_id".to_string(),
                "name".to_string(),
                "tier".to_string(),
                "note".to_string(),
                "updated_at".to_string(),
            ],
        )
    }

    fn dimension() -> DimensionTable {
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap()
    }

    fn at(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn staged(id: i64, name: &str, tier: &str, note: &str, day: u32) -> StagingRecord {
        StagingRecord {
            key: crate::types::BusinessKey::new(vec![Cell::I64(id)]),
            row: TableRow::new(vec![
                Cell::I64(id),
                Cell::String(name.to_string()),
                Cell::String(tier.to_string()),
                Cell::String(note.to_string()),
                Cell::TimestampTz(at(day)),
            ]),
            extracted_at: at(day),
            cursor: Cursor::Timestamp(at(day)),
        }
    }

    fn key(id: i64) -> crate::types::BusinessKey {
        crate::types::BusinessKey::new(vec![Cell::I64(id)])
    }

    #[test]
    fn new_keys_insert_an_open_ended_current_version() {
        let mut dimension = dimension();

        let stats = ScdMerger::new()
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "", 1)],
                ScdMode::Type2,
            )
            .unwrap();

        assert_eq!(stats.inserts, 1);

        let current = dimension.current_record(&key(42)).unwrap();
        assert_eq!(current.effective_from, at(1));
        assert_eq!(current.effective_to, None);
        assert!(current.is_current);
    }

    #[test]
    fn type2_change_closes_the_old_version_and_inserts_a_new_one() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "", 1)],
                ScdMode::Type2,
            )
            .unwrap();
        let first_key = dimension.current_surrogate_key(&key(42)).unwrap();

        let stats = merger
            .merge(
                &mut dimension,
                &[staged(42, "B", "gold", "", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        assert_eq!(stats.versions_closed, 1);
        assert_eq!(stats.inserts, 1);

        let versions = dimension.versions(&key(42));
        assert_eq!(versions.len(), 2);

        let closed = versions[0];
        assert_eq!(closed.effective_to, Some(at(2)));
        assert!(!closed.is_current);

        let current = versions[1];
        assert_eq!(current.effective_from, at(2));
        assert!(current.is_current);
        assert_ne!(current.surrogate_key, first_key);
    }

    #[test]
    fn reapplying_the_same_batch_creates_no_new_version() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "B", "gold", "", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        let stats = merger
            .merge(
                &mut dimension,
                &[staged(42, "B", "gold", "", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.inserts, 0);
        assert_eq!(dimension.versions(&key(42)).len(), 1);
    }

    #[test]
    fn non_tracked_attribute_changes_never_trigger_versioning() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "old note", 1)],
                ScdMode::Type2,
            )
            .unwrap();

        let stats = merger
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "new note", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        assert_eq!(stats.unchanged, 1);
        assert_eq!(dimension.versions(&key(42)).len(), 1);
    }

    #[test]
    fn out_of_order_batches_are_rejected_without_applying_anything() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "B", "gold", "", 3)],
                ScdMode::Type2,
            )
            .unwrap();

        let result = merger.merge(
            &mut dimension,
            &[staged(42, "stale", "gold", "", 2)],
            ScdMode::Type2,
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfOrderBatch);
        assert_eq!(dimension.versions(&key(42)).len(), 1);

        let current = dimension.current_record(&key(42)).unwrap();
        assert_eq!(current.attributes.values()[1], Cell::String("B".into()));
    }

    #[test]
    fn type1_overwrites_in_place_without_history() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "", 1)],
                ScdMode::Type1,
            )
            .unwrap();
        let original_key = dimension.current_surrogate_key(&key(42)).unwrap();

        let stats = merger
            .merge(
                &mut dimension,
                &[staged(42, "B", "silver", "", 2)],
                ScdMode::Type1,
            )
            .unwrap();

        assert_eq!(stats.updates, 1);
        assert_eq!(dimension.versions(&key(42)).len(), 1);

        let current = dimension.current_record(&key(42)).unwrap();
        assert_eq!(current.surrogate_key, original_key);
        assert_eq!(current.attributes.values()[1], Cell::String("B".into()));
    }

    #[test]
    fn same_timestamp_correction_amends_in_place() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        merger
            .merge(
                &mut dimension,
                &[staged(42, "A", "gold", "", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        let stats = merger
            .merge(
                &mut dimension,
                &[staged(42, "A-corrected", "gold", "", 2)],
                ScdMode::Type2,
            )
            .unwrap();

        assert_eq!(stats.updates, 1);

        // No zero-length interval was chained.
        let versions = dimension.versions(&key(42));
        assert_eq!(versions.len(), 1);
        assert_eq!(
            versions[0].attributes.values()[1],
            Cell::String("A-corrected".into())
        );
    }

    #[test]
    fn duplicate_staged_keys_are_rejected() {
        let mut dimension = dimension();

        let result = ScdMerger::new().merge(
            &mut dimension,
            &[staged(42, "A", "gold", "", 1), staged(42, "B", "gold", "", 1)],
            ScdMode::Type2,
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidData);
        assert!(dimension.is_empty());
    }

    #[test]
    fn intervals_stay_contiguous_across_many_versions() {
        let mut dimension = dimension();
        let merger = ScdMerger::new();

        for (day, tier) in [(1, "bronze"), (2, "silver"), (3, "gold"), (5, "platinum")] {
            merger
                .merge(
                    &mut dimension,
                    &[staged(42, "A", tier, "", day)],
                    ScdMode::Type2,
                )
                .unwrap();
        }

        let versions = dimension.versions(&key(42));
        assert_eq!(versions.len(), 4);

        let mut current_count = 0;
        for pair in versions.windows(2) {
            // Each closed version ends exactly where its successor begins.
            assert_eq!(pair[0].effective_to, Some(pair[1].effective_from));
        }
        for version in &versions {
            if version.is_current {
                current_count += 1;
                assert_eq!(version.effective_to, None);
            }
        }
        assert_eq!(current_count, 1);
    }
}
