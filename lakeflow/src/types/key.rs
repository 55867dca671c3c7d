use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::cell::{Cell, cell_hash};
use crate::types::row::TableRow;

/// Natural identifier of an entity as it exists in the source system.
///
/// [`BusinessKey`] is used as the grouping key during deduplication and as the
/// lookup key of the dimension current-version index. It supports composite
/// keys by storing multiple [`Cell`] values.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessKey {
    /// The actual values of the business key columns.
    values: Vec<Cell>,
}

// Manual Eq implementation since Cell doesn't derive Eq.
// This is safe because Cell's PartialEq is reflexive for all practical cases.
impl Eq for BusinessKey {}

impl BusinessKey {
    /// Creates a new business key from a list of cell values.
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Creates a new business key by extracting values from a row at the given indices.
    pub fn from_row(row: &TableRow, key_column_indices: &[usize]) -> Self {
        let values: Vec<Cell> = key_column_indices
            .iter()
            .map(|&idx| row.values()[idx].clone())
            .collect();
        Self { values }
    }

    /// Returns the values of the business key.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }
}

impl Hash for BusinessKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.values {
            cell_hash(value, state);
        }
    }
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in &self.values {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{value:?}")?;
            first = false;
        }
        Ok(())
    }
}
