//! # Lumen Infrastructure
//!
//! Adapters around the `lumen-core` engine.
//!
//! This crate contains:
//! - Settings loading from TOML/JSON files and environment variables
//! - An in-memory L2 store
//! - Bootstrap wiring cache and limiter registries from settings
//!
//! ## Architecture
//! - Implements ports defined in `lumen-core` (`L2Store`)
//! - Contains the code touching the file system and the process environment

pub mod bootstrap;
pub mod config;
pub mod store;

// Re-export commonly used items
pub use bootstrap::{BootstrapError, Lumen};
pub use config::{load, load_from_env, load_from_file, probe_config_paths};
pub use store::MemoryStore;
