//! Configuration loading for lakeflow services.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{load_config, Config, LoadConfigError};
