//! Single-use limiter
//!
//! The first call for an identifier stores a marker that lives for the
//! window; every later call inside the window is limited.

use std::fmt::Debug;
use std::time::Duration;

use lumen_common::time::{Clock, SystemClock};
use lumen_domain::LimiterKind;
use tracing::debug;

use super::limiter::Limiter;
use super::particle::Particle;
use crate::light::{CacheError, KeyGenerator, LightCache};

const MARKER: u64 = 1;

/// Exactly one admitted call per identifier and window
#[derive(Debug, Clone)]
pub struct IdempotentLimiter<C = SystemClock>
where
    C: Clock + Clone,
{
    name: String,
    keys: KeyGenerator,
    expire: Duration,
    store: LightCache<u64, C>,
}

impl<C> IdempotentLimiter<C>
where
    C: Clock + Clone,
{
    /// Create a limiter; `expire` is the window used when a call passes a
    /// zero expiry
    pub fn new(
        name: impl Into<String>,
        keys: KeyGenerator,
        expire: Duration,
        store: LightCache<u64, C>,
    ) -> Self {
        Self { name: name.into(), keys, expire, store }
    }

    /// State store holding the markers
    pub fn store(&self) -> &LightCache<u64, C> {
        &self.store
    }
}

impl<C> Limiter for IdempotentLimiter<C>
where
    C: Clock + Clone + Debug,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::Idempotent
    }

    fn admit(&self, id: &str, expire: Duration) -> Result<Particle, CacheError> {
        let key = self.keys.derive(id)?;
        let window = if expire.is_zero() { self.expire } else { expire };

        let mut first = false;
        let value = self.store.update_with(&key, Some(window), |marker| match marker {
            Some(marker) => *marker,
            None => {
                first = true;
                MARKER
            }
        });

        let particle = Particle::new(!first, value, LimiterKind::Idempotent, &self.name);
        debug!(
            limiter = %self.name,
            kind = %LimiterKind::Idempotent,
            key = %key,
            limited = particle.limited,
            "Limiter verdict"
        );
        Ok(particle)
    }

    fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }
}
