//! Persistent state for the load pipeline.
//!
//! [`watermark`] tracks per-table extraction progress, [`batch`] lands raw
//! extracted batches.

pub mod batch;
pub mod watermark;
