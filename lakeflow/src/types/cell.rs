use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single typed column value of a source row.
///
/// The variant set covers the value types that survive extraction from the
/// supported sources. Cursor columns must hold [`Cell::I32`], [`Cell::I64`],
/// [`Cell::TimestampTz`] or [`Cell::String`] values.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(Uuid),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

/// Hashes a [`Cell`] value in a deterministic way.
///
/// Floats are hashed by their bit representation so that identical values
/// always produce identical hashes.
pub fn cell_hash<H: Hasher>(cell: &Cell, state: &mut H) {
    // Hash discriminant for type safety
    std::mem::discriminant(cell).hash(state);

    match cell {
        Cell::Null => {}
        Cell::Bool(v) => v.hash(state),
        Cell::I32(v) => v.hash(state),
        Cell::I64(v) => v.hash(state),
        Cell::F64(v) => v.to_bits().hash(state),
        Cell::String(v) => v.hash(state),
        Cell::Uuid(v) => v.hash(state),
        Cell::TimestampTz(v) => v.hash(state),
        // For complex types, use a string representation for hashing
        Cell::Json(v) => v.to_string().hash(state),
    }
}
