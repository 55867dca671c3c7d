//! Telemetry initialization for lakeflow binaries and tests.

pub mod tracing;
