use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::ValidationError;

/// A configured watermark cursor value.
///
/// A table's cursor column has one fixed type, so a pipeline only ever
/// compares values of the same variant. The untagged representation keeps
/// persisted watermark state readable as `{ "cursor": <value> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorSpec {
    /// Monotonic integer cursor, e.g. an auto-incrementing id or LSN.
    Int(i64),
    /// Timestamp cursor, e.g. an `updated_at` column.
    Timestamp(DateTime<Utc>),
    /// Lexicographically ordered text cursor, e.g. an encoded sequence number.
    Text(String),
}

/// Dimension update strategy applied when merging staged rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScdMode {
    /// Overwrite attributes in place, discarding history.
    Type1,
    /// Preserve history via time-bounded versions per business key.
    Type2,
}

impl fmt::Display for ScdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScdMode::Type1 => f.write_str("type1"),
            ScdMode::Type2 => f.write_str("type2"),
        }
    }
}

/// Immutable per-table extraction and merge configuration.
///
/// One record per source table, validated at load time. The `scd_mode` is a
/// required field so that the versioning strategy of every dimension is an
/// explicit decision rather than a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceTableConfig {
    /// Schema of the source table.
    pub schema: String,
    /// Name of the source table.
    pub name: String,
    /// Column used to bound incremental extraction queries.
    pub cursor_column: String,
    /// Column(s) forming the business key of the table.
    pub key_columns: Vec<String>,
    /// Columns whose changes trigger versioning under Type-2 merges.
    ///
    /// When absent, every non-key column is tracked.
    #[serde(default)]
    pub tracked_columns: Option<Vec<String>>,
    /// Dimension update strategy for this table.
    pub scd_mode: ScdMode,
    /// Explicit start value for historical reload.
    ///
    /// When present, the next extraction uses `cursor_column >= backfill_from`
    /// instead of the stored watermark.
    #[serde(default)]
    pub backfill_from: Option<CursorSpec>,
}

impl SourceTableConfig {
    /// Returns the `schema.name` identifier of the table.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Validates table configuration settings.
    ///
    /// Ensures names are non-empty, the business key is present and free of
    /// duplicates, and tracked columns do not overlap the key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.schema".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.name.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.cursor_column.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.cursor_column".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.key_columns.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "table.key_columns".to_string(),
                constraint: "must contain at least one column".to_string(),
            });
        }

        for (index, column) in self.key_columns.iter().enumerate() {
            if self.key_columns[..index].contains(column) {
                return Err(ValidationError::InvalidFieldValue {
                    field: "table.key_columns".to_string(),
                    constraint: format!("duplicate column `{column}`"),
                });
            }
        }

        if let Some(tracked) = &self.tracked_columns {
            for column in tracked {
                if self.key_columns.contains(column) {
                    return Err(ValidationError::InvalidFieldValue {
                        field: "table.tracked_columns".to_string(),
                        constraint: format!("`{column}` is part of the business key"),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_table() -> SourceTableConfig {
        SourceTableConfig {
            schema: "sales".to_string(),
            name: "orders".to_string(),
            cursor_column: "updated_at".to_string(),
            key_columns: vec!["order_id".to_string()],
            tracked_columns: None,
            scd_mode: ScdMode::Type2,
            backfill_from: None,
        }
    }

    #[test]
    fn valid_table_config_passes_validation() {
        assert!(orders_table().validate().is_ok());
    }

    #[test]
    fn empty_key_columns_are_rejected() {
        let mut table = orders_table();
        table.key_columns.clear();

        assert!(table.validate().is_err());
    }

    #[test]
    fn duplicate_key_columns_are_rejected() {
        let mut table = orders_table();
        table.key_columns = vec!["order_id".to_string(), "order_id".to_string()];

        assert!(table.validate().is_err());
    }

    #[test]
    fn tracked_columns_overlapping_key_are_rejected() {
        let mut table = orders_table();
        table.tracked_columns = Some(vec!["order_id".to_string()]);

        assert!(table.validate().is_err());
    }

    #[test]
    fn cursor_spec_deserializes_untagged() {
        let int: CursorSpec = serde_json::from_str("42").unwrap();
        assert_eq!(int, CursorSpec::Int(42));

        let timestamp: CursorSpec = serde_json::from_str("\"2024-01-03T00:00:00Z\"").unwrap();
        assert!(matches!(timestamp, CursorSpec::Timestamp(_)));

        let text: CursorSpec = serde_json::from_str("\"0000000a/0000001b\"").unwrap();
        assert_eq!(text, CursorSpec::Text("0000000a/0000001b".to_string()));
    }

    #[test]
    fn scd_mode_uses_snake_case_wire_format() {
        assert_eq!(serde_json::to_string(&ScdMode::Type2).unwrap(), "\"type2\"");

        let mode: ScdMode = serde_json::from_str("\"type1\"").unwrap();
        assert_eq!(mode, ScdMode::Type1);
    }
}
