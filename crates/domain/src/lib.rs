//! # Lumen Domain
//!
//! Configuration records and tags shared by the cache engine, the limiters
//! and the configuration loader.
//!
//! ## Architecture
//! - No dependencies on other Lumen crates
//! - Pure serde data structures and validation

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
