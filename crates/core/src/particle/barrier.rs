//! Composite limiter
//!
//! Members are evaluated in list order against the same identifier. The
//! first limited verdict is returned as is, so callers can tell from
//! `particle.kind` and `particle.limiter` which policy fired, and members
//! after it are not touched. When nothing fires the last member's verdict is
//! returned.

use std::sync::Arc;
use std::time::Duration;

use lumen_domain::LimiterKind;
use tracing::debug;

use super::limiter::Limiter;
use super::particle::Particle;
use crate::light::CacheError;

/// Ordered chain of limiters
#[derive(Debug, Clone)]
pub struct BarrierLimiter {
    name: String,
    chain: Vec<Arc<dyn Limiter>>,
}

impl BarrierLimiter {
    /// Create a barrier over `chain`
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` for an empty chain.
    pub fn new(name: impl Into<String>, chain: Vec<Arc<dyn Limiter>>) -> Result<Self, CacheError> {
        let name = name.into();
        if chain.is_empty() {
            return Err(CacheError::InvalidConfiguration {
                cache: name,
                message: "barrier chain is empty".to_string(),
            });
        }
        Ok(Self { name, chain })
    }

    /// Member names in evaluation order
    pub fn members(&self) -> Vec<&str> {
        self.chain.iter().map(|limiter| limiter.name()).collect()
    }
}

impl Limiter for BarrierLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::Barrier
    }

    fn admit(&self, id: &str, expire: Duration) -> Result<Particle, CacheError> {
        let mut last = None;
        for limiter in &self.chain {
            let particle = limiter.admit(id, expire)?;
            if particle.limited {
                debug!(barrier = %self.name, fired = %particle.limiter, "Barrier short-circuited");
                return Ok(particle);
            }
            last = Some(particle);
        }
        last.ok_or_else(|| CacheError::InvalidConfiguration {
            cache: self.name.clone(),
            message: "barrier chain is empty".to_string(),
        })
    }
}
