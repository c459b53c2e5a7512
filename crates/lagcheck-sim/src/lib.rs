pub mod fault;
pub mod memory;

pub use fault::{FaultConfig, FaultStats, FaultyStore, FAULT_PREFIX};
pub use memory::MemoryStore;
