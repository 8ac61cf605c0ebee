//! Cache key derivation: `prefix + identifier`

use super::error::CacheError;

/// Derives cache keys from caller-domain identifiers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the cache key for `id`
    ///
    /// # Errors
    /// Returns `CacheError::MissingKey` when `id` is empty or blank.
    pub fn derive(&self, id: &str) -> Result<String, CacheError> {
        if id.trim().is_empty() {
            return Err(CacheError::MissingKey { prefix: self.prefix.clone() });
        }
        Ok(format!("{}{}", self.prefix, id))
    }
}
