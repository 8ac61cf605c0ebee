//! L2 store adapters

pub mod memory;

pub use memory::MemoryStore;
