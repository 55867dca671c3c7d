pub mod base;
pub mod memory;

pub use base::{WatermarkRecord, WatermarkStore};
pub use memory::MemoryWatermarkStore;
