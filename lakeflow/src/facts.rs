//! Append-only fact tables with dimension key resolution.
//!
//! Staged fact rows reference dimensions by business key; the appender
//! resolves each reference to a surrogate key before the row is admitted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{ErrorKind, FlowError, FlowResult};
use crate::flow_error;
use crate::merge::table::DimensionTable;
use crate::types::{
    BusinessKey, Cell, FactRecord, StagingRecord, SurrogateKey, TableName, TableSchema,
};

/// How a fact row's dimension references are resolved to surrogate keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResolution {
    /// Resolve to the dimension's current version at append time.
    Current,
    /// Resolve to the version whose validity interval contains the row's
    /// event timestamp, for historical accuracy at event time.
    AtEventTime,
}

/// Declares that some staging columns reference a dimension's business key.
#[derive(Debug, Clone)]
pub struct DimensionBinding {
    /// The referenced dimension table.
    pub dimension: TableName,
    /// Staging columns holding the dimension's business key.
    pub key_columns: Vec<String>,
    /// Resolution strategy for this reference.
    pub resolution: KeyResolution,
}

/// Read access to dimension surrogate keys during fact appends.
pub trait DimensionLookup {
    /// Returns the surrogate key of the current version of a business key.
    fn current_key(&self, dimension: &TableName, key: &BusinessKey) -> Option<SurrogateKey>;

    /// Returns the surrogate key of the version effective at `at`.
    fn key_at(
        &self,
        dimension: &TableName,
        key: &BusinessKey,
        at: DateTime<Utc>,
    ) -> Option<SurrogateKey>;
}

impl DimensionLookup for HashMap<TableName, DimensionTable> {
    fn current_key(&self, dimension: &TableName, key: &BusinessKey) -> Option<SurrogateKey> {
        self.get(dimension)
            .and_then(|table| table.current_surrogate_key(key))
    }

    fn key_at(
        &self,
        dimension: &TableName,
        key: &BusinessKey,
        at: DateTime<Utc>,
    ) -> Option<SurrogateKey> {
        self.get(dimension)
            .and_then(|table| table.surrogate_key_at(key, at))
    }
}

/// A dimension binding with its key columns resolved to staging indices.
#[derive(Debug, Clone)]
struct ResolvedBinding {
    binding: DimensionBinding,
    key_indices: Vec<usize>,
}

/// An append-only fact table.
///
/// Rows are admitted through [`FactAppender::append`] and are never mutated or
/// deleted afterwards. The table remembers the business keys it has admitted
/// so that re-feeding an already-ingested batch is a safe no-op.
#[derive(Debug)]
pub struct FactTable {
    name: TableName,
    schema: Arc<TableSchema>,
    key_indices: Vec<usize>,
    bindings: Vec<ResolvedBinding>,
    event_time_index: Option<usize>,
    rows: Vec<FactRecord>,
    seen: HashSet<BusinessKey>,
}

impl FactTable {
    /// Creates an empty fact table.
    ///
    /// `key_columns` identify the fact row itself (e.g. an event id);
    /// `bindings` declare the referenced dimensions. `event_time_column` names
    /// the column holding the event timestamp and is required as soon as any
    /// binding resolves [`KeyResolution::AtEventTime`].
    pub fn new(
        schema: Arc<TableSchema>,
        key_columns: &[String],
        bindings: Vec<DimensionBinding>,
        event_time_column: Option<&str>,
    ) -> FlowResult<Self> {
        let name = schema.table.clone();

        let key_indices = resolve_columns(&schema, key_columns, &name)?;

        let event_time_index = match event_time_column {
            Some(column) => Some(
                schema
                    .column_index(column)
                    .ok_or_else(|| missing_column(&name, column))?,
            ),
            None => None,
        };

        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in bindings {
            if binding.resolution == KeyResolution::AtEventTime && event_time_index.is_none() {
                return Err(flow_error!(
                    ErrorKind::ConfigError,
                    "Event-time resolution requires an event time column",
                    format!(
                        "fact table {name} binds dimension {} at event time",
                        binding.dimension
                    )
                ));
            }

            let key_indices = resolve_columns(&schema, &binding.key_columns, &name)?;
            resolved.push(ResolvedBinding {
                binding,
                key_indices,
            });
        }

        Ok(Self {
            name,
            schema,
            key_indices,
            bindings: resolved,
            event_time_index,
            rows: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Returns the name of the fact table.
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Returns the staging schema the table was built against.
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Returns every appended row.
    pub fn rows(&self) -> &[FactRecord] {
        &self.rows
    }

    /// Returns the number of appended rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no rows have been appended.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A staged fact row excluded from the appended set.
#[derive(Debug)]
pub struct RejectedFact {
    /// The excluded staging record.
    pub record: StagingRecord,
    /// Why the record was excluded.
    pub error: FlowError,
}

/// Outcome of appending one staged batch to a fact table.
///
/// Rejected rows are excluded from the appended set; whether they are
/// re-queued, quarantined, or dropped is the caller's policy.
#[derive(Debug, Default)]
pub struct FactAppendReport {
    /// Rows admitted to the fact table.
    pub appended: usize,
    /// Rows skipped because their business key was already admitted.
    pub duplicates: usize,
    /// Rows excluded because a dimension reference did not resolve.
    pub rejected: Vec<RejectedFact>,
}

/// Appends deduplicated fact rows, resolving dimension references.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactAppender;

impl FactAppender {
    /// Creates a new appender.
    pub fn new() -> Self {
        Self
    }

    /// Appends staged rows to `facts`, resolving every dimension reference
    /// against `dimensions`.
    ///
    /// A row whose reference does not resolve is excluded and reported with
    /// [`ErrorKind::UnresolvedReference`]; the remaining rows are still
    /// appended. Rows whose business key was admitted by an earlier append are
    /// skipped, keeping re-fed batches idempotent.
    pub fn append(
        &self,
        facts: &mut FactTable,
        staging: &[StagingRecord],
        dimensions: &impl DimensionLookup,
    ) -> FlowResult<FactAppendReport> {
        let mut report = FactAppendReport::default();

        'rows: for record in staging {
            let fact_key = BusinessKey::from_row(&record.row, &facts.key_indices);
            if facts.seen.contains(&fact_key) {
                report.duplicates += 1;
                continue;
            }

            let mut dimension_keys = Vec::with_capacity(facts.bindings.len());
            for resolved in &facts.bindings {
                match resolve_reference(facts, resolved, record, dimensions) {
                    Ok(surrogate) => dimension_keys.push(surrogate),
                    Err(error) => {
                        warn!(
                            table = %facts.name,
                            dimension = %resolved.binding.dimension,
                            "excluding fact row with unresolved reference"
                        );
                        report.rejected.push(RejectedFact {
                            record: record.clone(),
                            error,
                        });
                        continue 'rows;
                    }
                }
            }

            facts.seen.insert(fact_key.clone());
            facts.rows.push(FactRecord {
                key: fact_key,
                dimension_keys,
                attributes: record.row.clone(),
            });
            report.appended += 1;
        }

        info!(
            table = %facts.name,
            appended = report.appended,
            duplicates = report.duplicates,
            rejected = report.rejected.len(),
            "fact append finished"
        );

        Ok(report)
    }
}

/// Resolves one dimension reference of one staged row.
fn resolve_reference(
    facts: &FactTable,
    resolved: &ResolvedBinding,
    record: &StagingRecord,
    dimensions: &impl DimensionLookup,
) -> Result<SurrogateKey, FlowError> {
    let reference = BusinessKey::from_row(&record.row, &resolved.key_indices);

    let surrogate = match resolved.binding.resolution {
        KeyResolution::Current => dimensions.current_key(&resolved.binding.dimension, &reference),
        KeyResolution::AtEventTime => {
            let event_time = event_time(facts, record)?;
            dimensions.key_at(&resolved.binding.dimension, &reference, event_time)
        }
    };

    surrogate.ok_or_else(|| {
        flow_error!(
            ErrorKind::UnresolvedReference,
            "Fact row references a missing dimension record",
            format!(
                "table {}: no record in {} for key {reference}",
                facts.name, resolved.binding.dimension
            )
        )
    })
}

/// Reads the event timestamp of a staged row.
fn event_time(facts: &FactTable, record: &StagingRecord) -> Result<DateTime<Utc>, FlowError> {
    let index = facts.event_time_index.ok_or_else(|| {
        flow_error!(
            ErrorKind::InvalidState,
            "Fact table has no event time column"
        )
    })?;

    match &record.row.values()[index] {
        Cell::TimestampTz(at) => Ok(*at),
        other => Err(flow_error!(
            ErrorKind::ConversionError,
            "Event time column does not hold a timestamp",
            format!("table {}: found {other:?}", facts.name)
        )),
    }
}

/// Resolves column names against the staging schema.
fn resolve_columns(
    schema: &TableSchema,
    columns: &[String],
    table: &TableName,
) -> FlowResult<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            schema
                .column_index(column)
                .ok_or_else(|| missing_column(table, column))
        })
        .collect()
}

fn missing_column(table: &TableName, column: &str) -> FlowError {
    flow_error!(
        ErrorKind::SourceSchemaError,
        "Column not found in staging schema",
        format!("table {table} has no column `{column}`")
    )
}
