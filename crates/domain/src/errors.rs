//! Error types used throughout the domain

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for configuration and instance lookup
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum LumenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Lumen domain operations
pub type Result<T> = std::result::Result<T, LumenError>;
