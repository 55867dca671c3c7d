//! Reconciliation of staged rows into historized dimension tables.
//!
//! [`table`] holds the dimension table representation and its
//! current-version index, [`scd`] implements the Type-1/Type-2 merge engine.

pub mod scd;
pub mod table;

pub use scd::{MergeStats, ScdMerger};
pub use table::DimensionTable;
