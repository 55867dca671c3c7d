use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use config::shared::CursorSpec;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FlowResult};
use crate::flow_error;
use crate::types::cell::Cell;

/// Last-processed value of a table's monotonic incremental column.
///
/// A table's cursor column has one fixed type, so comparisons only ever see
/// values of the same variant in practice. The ordering is nonetheless total:
/// mismatched variants order by variant rank, which keeps watermark
/// monotonicity checks deterministic even for misconfigured tables.
///
/// The untagged serde representation keeps persisted watermark state readable
/// as `{ "cursor": <value> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// Monotonic integer cursor, e.g. an auto-incrementing id.
    Int(i64),
    /// Timestamp cursor, e.g. an `updated_at` column.
    Timestamp(DateTime<Utc>),
    /// Lexicographically ordered text cursor.
    Text(String),
}

impl Cursor {
    /// Extracts a cursor value from a cell of the cursor column.
    ///
    /// Fails with [`ErrorKind::ConversionError`] when the cell is null or of a
    /// type that has no defined ordering.
    pub fn from_cell(cell: &Cell) -> FlowResult<Cursor> {
        match cell {
            Cell::I32(value) => Ok(Cursor::Int(i64::from(*value))),
            Cell::I64(value) => Ok(Cursor::Int(*value)),
            Cell::TimestampTz(value) => Ok(Cursor::Timestamp(*value)),
            Cell::String(value) => Ok(Cursor::Text(value.clone())),
            other => Err(flow_error!(
                ErrorKind::ConversionError,
                "Cell is not usable as a cursor value",
                format!("unsupported cursor cell: {other:?}")
            )),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cursor::Int(_) => 0,
            Cursor::Timestamp(_) => 1,
            Cursor::Text(_) => 2,
        }
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cursor::Int(a), Cursor::Int(b)) => a.cmp(b),
            (Cursor::Timestamp(a), Cursor::Timestamp(b)) => a.cmp(b),
            (Cursor::Text(a), Cursor::Text(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Int(value) => write!(f, "{value}"),
            Cursor::Timestamp(value) => write!(f, "{}", value.to_rfc3339()),
            Cursor::Text(value) => f.write_str(value),
        }
    }
}

impl From<CursorSpec> for Cursor {
    fn from(spec: CursorSpec) -> Self {
        match spec {
            CursorSpec::Int(value) => Cursor::Int(value),
            CursorSpec::Timestamp(value) => Cursor::Timestamp(value),
            CursorSpec::Text(value) => Cursor::Text(value),
        }
    }
}

impl From<&CursorSpec> for Cursor {
    fn from(spec: &CursorSpec) -> Self {
        spec.clone().into()
    }
}
