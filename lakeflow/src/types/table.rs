use std::fmt;
use std::sync::Arc;

use config::shared::SourceTableConfig;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fully qualified name of a source table.
///
/// [`TableName`] is the identifier under which watermarks, landed batches and
/// per-table configuration are keyed. It serializes as the single string
/// `"schema.name"` so that it can key persisted maps and appear verbatim in
/// alert payloads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// Schema of the table.
    pub schema: String,
    /// Name of the table.
    pub name: String,
}

impl TableName {
    /// Creates a new table name from schema and name parts.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl Serialize for TableName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TableName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let qualified = String::deserialize(deserializer)?;
        let (schema, name) = qualified.split_once('.').ok_or_else(|| {
            D::Error::custom(format!("`{qualified}` is not a `schema.name` table name"))
        })?;

        Ok(TableName::new(schema, name))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl From<&SourceTableConfig> for TableName {
    fn from(config: &SourceTableConfig) -> Self {
        TableName::new(config.schema.clone(), config.name.clone())
    }
}

/// Ordered column layout of a source table.
///
/// Rows extracted from a table carry their values in this column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// The table this schema describes.
    pub table: TableName,
    /// Column names in source column order.
    pub columns: Vec<String>,
}

impl TableSchema {
    /// Creates a new schema for the given table and columns.
    pub fn new(table: TableName, columns: Vec<String>) -> Arc<Self> {
        Arc::new(Self { table, columns })
    }

    /// Returns the position of a column within the row layout.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }
}
