use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use config::shared::SourceTableConfig;

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;
use crate::types::{
    BusinessKey, DimensionRecord, SurrogateKey, TableName, TableRow, TableSchema,
};

/// A historized dimension table with its current-version index.
///
/// Holds every version of every business key plus an index from business key
/// to the current version, mirroring how the merge engine looks rows up during
/// reconciliation. Mutation goes exclusively through [`ScdMerger::merge`],
/// which keeps the invariants: per key, at most one record is current and
/// validity intervals never overlap.
///
/// [`ScdMerger::merge`]: crate::merge::scd::ScdMerger::merge
#[derive(Debug)]
pub struct DimensionTable {
    name: TableName,
    schema: Arc<TableSchema>,
    tracked_indices: Vec<usize>,
    records: Vec<DimensionRecord>,
    current: HashMap<BusinessKey, usize>,
    last_applied_at: Option<DateTime<Utc>>,
}

impl DimensionTable {
    /// Creates an empty dimension table for a configured source table.
    ///
    /// Resolves the configured business-key and tracked columns against the
    /// staging schema. When no tracked columns are configured, every non-key
    /// column is tracked.
    pub fn for_table(config: &SourceTableConfig, schema: Arc<TableSchema>) -> FlowResult<Self> {
        let name = TableName::from(config);

        let key_indices = resolve_columns(&schema, &config.key_columns, &name)?;

        let tracked_indices = match &config.tracked_columns {
            Some(columns) => resolve_columns(&schema, columns, &name)?,
            None => (0..schema.columns.len())
                .filter(|index| !key_indices.contains(index))
                .collect(),
        };

        Ok(Self {
            name,
            schema,
            tracked_indices,
            records: Vec::new(),
            current: HashMap::new(),
            last_applied_at: None,
        })
    }

    /// Returns the name of the dimension table.
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Returns the staging schema the table was built against.
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Returns every stored record, all versions included.
    pub fn records(&self) -> &[DimensionRecord] {
        &self.records
    }

    /// Returns the number of stored records, all versions included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns every version of a business key in insertion order.
    pub fn versions(&self, key: &BusinessKey) -> Vec<&DimensionRecord> {
        self.records
            .iter()
            .filter(|record| record.business_key == *key)
            .collect()
    }

    /// Returns the current version of a business key, if any.
    pub fn current_record(&self, key: &BusinessKey) -> Option<&DimensionRecord> {
        self.current.get(key).map(|&index| &self.records[index])
    }

    /// Returns the surrogate key of the current version of a business key.
    pub fn current_surrogate_key(&self, key: &BusinessKey) -> Option<SurrogateKey> {
        self.current_record(key).map(|record| record.surrogate_key)
    }

    /// Returns the surrogate key of the version whose validity interval
    /// contains `at`.
    pub fn surrogate_key_at(&self, key: &BusinessKey, at: DateTime<Utc>) -> Option<SurrogateKey> {
        self.records
            .iter()
            .find(|record| record.business_key == *key && record.is_effective_at(at))
            .map(|record| record.surrogate_key)
    }

    /// Returns the extraction timestamp of the last applied batch.
    pub fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }

    /// Returns the index of the current version of a business key.
    pub(crate) fn current_index(&self, key: &BusinessKey) -> Option<usize> {
        self.current.get(key).copied()
    }

    /// Returns true when any tracked attribute of `row` differs from the
    /// record at `index`. Non-tracked attributes are never compared.
    pub(crate) fn tracked_differs(&self, index: usize, row: &TableRow) -> bool {
        let attributes = self.records[index].attributes.values();
        self.tracked_indices
            .iter()
            .any(|&column| attributes[column] != row.values()[column])
    }

    /// Returns true when the full attribute row at `index` differs from `row`.
    pub(crate) fn attributes_differ(&self, index: usize, row: &TableRow) -> bool {
        self.records[index].attributes != *row
    }

    /// Inserts the first version of a new business key.
    pub(crate) fn insert_new(&mut self, key: BusinessKey, row: TableRow, at: DateTime<Utc>) {
        let record = DimensionRecord {
            business_key: key.clone(),
            surrogate_key: SurrogateKey::generate(),
            attributes: row,
            effective_from: at,
            effective_to: None,
            is_current: true,
        };

        self.current.insert(key, self.records.len());
        self.records.push(record);
    }

    /// Replaces the attributes of the record at `index`, keeping its surrogate
    /// key and validity interval.
    pub(crate) fn overwrite_attributes(&mut self, index: usize, row: TableRow) {
        self.records[index].attributes = row;
    }

    /// Closes the current version at `index` and inserts a new current version
    /// effective from `at`.
    pub(crate) fn close_and_insert(&mut self, index: usize, row: TableRow, at: DateTime<Utc>) {
        let key = self.records[index].business_key.clone();

        self.records[index].effective_to = Some(at);
        self.records[index].is_current = false;

        let record = DimensionRecord {
            business_key: key.clone(),
            surrogate_key: SurrogateKey::generate(),
            attributes: row,
            effective_from: at,
            effective_to: None,
            is_current: true,
        };

        self.current.insert(key, self.records.len());
        self.records.push(record);
    }

    /// Records the extraction timestamp of a successfully applied batch.
    pub(crate) fn mark_applied(&mut self, at: DateTime<Utc>) {
        self.last_applied_at = Some(match self.last_applied_at {
            Some(existing) => existing.max(at),
            None => at,
        });
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
            schema.column_index(column).ok_or_else(|| {
                flow_error!(
                    ErrorKind::SourceSchemaError,
                    "Column not found in staging schema",
                    format!("table {table} has no column `{column}`")
                )
            })
        })
        .collect()
}
