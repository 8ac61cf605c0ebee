//! Cache engine errors

use std::time::Duration;

use lumen_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use lumen_domain::LumenError;
use thiserror::Error;

/// Faults raised by the cache engine itself
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Configuration rejected before touching the map
    #[error("Invalid configuration for cache '{cache}': {message}")]
    InvalidConfiguration { cache: String, message: String },

    /// Identifier needed to derive a cache key was empty
    #[error("Missing cache key for prefix '{prefix}'")]
    MissingKey { prefix: String },

    /// A value could not be encoded for, or decoded from, the L2 tier
    #[error("Serialization failed for key '{key}': {message}")]
    Serialization { key: String, message: String },

    /// L2 backend failure
    #[error(transparent)]
    Backend(#[from] CommonError),
}

impl CacheError {
    pub(crate) fn invalid_config(cache: &str, err: LumenError) -> Self {
        let message = match err {
            LumenError::Config(message)
            | LumenError::InvalidInput(message)
            | LumenError::NotFound(message)
            | LumenError::Internal(message) => message,
        };
        Self::InvalidConfiguration { cache: cache.to_string(), message }
    }

    pub(crate) fn serialization(key: &str, err: &serde_json::Error) -> Self {
        Self::Serialization { key: key.to_string(), message: err.to_string() }
    }
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Backend(err) => err.severity(),
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_critical())
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error of a read-through or write-through call, generic over the
/// producer's error type
#[derive(Debug, Error)]
pub enum LightError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Engine fault
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The producer failed; nothing was cached
    #[error("Value producer failed")]
    ProducerFailed {
        #[source]
        source: E,
    },
}

impl<E> LightError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The producer's error, if that is what failed
    pub fn into_producer_error(self) -> Option<E> {
        match self {
            Self::ProducerFailed { source } => Some(source),
            Self::Cache(_) => None,
        }
    }
}
