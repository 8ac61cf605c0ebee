//! Limiters built from settings
//!
//! Every idempotent or times limiter gets its own state store (a
//! `LightCache<u64>` configured from `ParticleSettings::store`). Barriers are
//! wired after their members, in declaration order of the chain.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use lumen_common::time::{Clock, SystemClock};
use lumen_domain::{LimiterKind, LimiterSpec, ParticleSettings};
use tracing::debug;

use super::barrier::BarrierLimiter;
use super::idempotent::IdempotentLimiter;
use super::limiter::Limiter;
use super::times::TimesLimiter;
use crate::light::{CacheError, KeyGenerator, LightCache};

const STORE_NAME: &str = "particle";

/// Named limiters
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    limiters: HashMap<String, Arc<dyn Limiter>>,
    order: Vec<String>,
}

impl LimiterRegistry {
    /// Build every declared limiter
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` when the settings fail
    /// validation.
    pub fn from_settings(settings: &ParticleSettings) -> Result<Self, CacheError> {
        Self::with_clock(settings, SystemClock)
    }

    /// Build every declared limiter on a custom clock
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` when the settings fail
    /// validation.
    pub fn with_clock<C>(settings: &ParticleSettings, clock: C) -> Result<Self, CacheError>
    where
        C: Clock + Clone + Debug,
    {
        settings.validate().map_err(|e| CacheError::invalid_config(STORE_NAME, e))?;

        let mut registry = Self::default();
        let specs = settings.ordered();

        for spec in specs.iter().filter(|s| s.kind != LimiterKind::Barrier) {
            let store = LightCache::with_clock(
                format!("{}_{}", STORE_NAME, spec.name),
                settings.store.clone(),
                None,
                clock.clone(),
            )?;
            let limiter = build_leaf(spec, store);
            registry.insert(limiter);
        }

        for spec in specs.iter().filter(|s| s.kind == LimiterKind::Barrier) {
            let chain = spec
                .chain
                .iter()
                .map(|member| {
                    registry.get(member).ok_or_else(|| CacheError::InvalidConfiguration {
                        cache: spec.name.clone(),
                        message: format!("unknown barrier member '{}'", member),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            registry.insert(Arc::new(BarrierLimiter::new(spec.name.clone(), chain)?));
        }

        debug!(limiters = ?registry.order, "Limiters built");
        Ok(registry)
    }

    /// Add a limiter, replacing one with the same name
    pub fn insert(&mut self, limiter: Arc<dyn Limiter>) {
        let name = limiter.name().to_string();
        if self.limiters.insert(name.clone(), limiter).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Limiter>> {
        self.limiters.get(name).cloned()
    }

    /// Names in build order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Sweep closed windows out of every limiter's state store
    ///
    /// Stores are unbounded by default, so expired markers and counters
    /// stay until touched again or swept here.
    pub fn purge_expired(&self) -> usize {
        let removed: usize = self.limiters.values().map(|limiter| limiter.purge_expired()).sum();
        debug!(removed, "Limiter state purged");
        removed
    }
}

fn build_leaf<C>(spec: &LimiterSpec, store: LightCache<u64, C>) -> Arc<dyn Limiter>
where
    C: Clock + Clone + Debug,
{
    let keys = KeyGenerator::new(spec.resolved_key_prefix());
    match spec.kind {
        LimiterKind::Times => Arc::new(TimesLimiter::new(
            spec.name.clone(),
            keys,
            spec.limit_times,
            spec.window,
            store,
        )),
        LimiterKind::Idempotent | LimiterKind::Barrier => Arc::new(IdempotentLimiter::new(
            spec.name.clone(),
            keys,
            Duration::from_secs(spec.key_expire),
            store,
        )),
    }
}
