//! Fixed-count limiter
//!
//! Every call increments a per-identifier counter. The counter's window
//! starts at the first call and is not extended by later calls; once the
//! counter passes the ceiling the call is limited.

use std::fmt::Debug;
use std::time::Duration;

use lumen_common::time::{Clock, SystemClock};
use lumen_domain::{LimiterKind, TimesWindow};
use tracing::debug;

use super::limiter::{LimitError, Limiter, LimiterExt};
use super::particle::Particle;
use crate::light::{CacheError, KeyGenerator, LightCache};

/// At most `limit_times` admitted calls per identifier and window
#[derive(Debug, Clone)]
pub struct TimesLimiter<C = SystemClock>
where
    C: Clock + Clone,
{
    name: String,
    keys: KeyGenerator,
    limit_times: u64,
    window: TimesWindow,
    store: LightCache<u64, C>,
}

impl<C> TimesLimiter<C>
where
    C: Clock + Clone + Debug,
{
    pub fn new(
        name: impl Into<String>,
        keys: KeyGenerator,
        limit_times: u64,
        window: TimesWindow,
        store: LightCache<u64, C>,
    ) -> Self {
        Self { name: name.into(), keys, limit_times, window, store }
    }

    pub fn limit_times(&self) -> u64 {
        self.limit_times
    }

    pub fn window(&self) -> TimesWindow {
        self.window
    }

    /// State store holding the counters
    pub fn store(&self) -> &LightCache<u64, C> {
        &self.store
    }

    /// [`LimiterExt::limit`] over the configured window
    ///
    /// # Errors
    /// As [`LimiterExt::limit`].
    pub fn limit_window<F, R, E>(&self, id: &str, body: F) -> Result<R, LimitError<E>>
    where
        F: FnOnce(&Particle) -> Result<R, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.limit(id, self.window.as_duration(), body)
    }
}

impl<C> Limiter for TimesLimiter<C>
where
    C: Clock + Clone + Debug,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::Times
    }

    /// The window is fixed at creation; `_expire` is ignored
    fn admit(&self, id: &str, _expire: Duration) -> Result<Particle, CacheError> {
        let key = self.keys.derive(id)?;
        let count = self.store.update_with(&key, Some(self.window.as_duration()), |count| {
            count.map_or(1, |n| n.saturating_add(1))
        });

        let particle = Particle::new(count > self.limit_times, count, LimiterKind::Times, &self.name);
        debug!(
            limiter = %self.name,
            kind = %LimiterKind::Times,
            key = %key,
            value = count,
            limited = particle.limited,
            "Limiter verdict"
        );
        Ok(particle)
    }

    fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }
}
