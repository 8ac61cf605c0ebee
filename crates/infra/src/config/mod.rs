//! Settings loading
//!
//! This module loads [`lumen_domain::Settings`] from environment variables
//! and files.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, parse_settings, probe_config_paths};
