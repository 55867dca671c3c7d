pub mod alerts;
pub mod concurrency;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod facts;
pub mod failpoints;
mod macros;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
