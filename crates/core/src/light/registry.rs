//! Named cache instances
//!
//! The registry owns a default instance built from the settings template and
//! hands out named instances. A name that was registered explicitly is a
//! custom instance and is returned as is; any other name gets an inner
//! instance (`lightCache_<name>`) created on first use. With
//! `copy_default_config` set (the default) it is seeded from the template
//! and then the caller's [`CacheableOptions`]; without it the instance keeps
//! `CacheConfig::default()` and the options are ignored. Overrides from the
//! settings file are applied last and win in both cases.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lumen_common::time::{Clock, SystemClock};
use lumen_domain::constants::{DEFAULT_CACHE_NAME, INNER_CACHE_PREFIX, NEVER_EXPIRE};
use lumen_domain::{CacheConfig, CacheOverrides, DiscardStrategy, LightSettings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::cache::LightCache;
use super::error::{CacheError, LightError};
use super::keys::KeyGenerator;
use super::store::L2Store;

/// Per-call options of a cacheable operation
#[derive(Debug, Clone, PartialEq)]
pub struct CacheableOptions {
    /// Seed a new instance from the default template and these options;
    /// when false the remaining fields have no effect
    pub copy_default_config: bool,
    pub strategy: DiscardStrategy,
    pub only_cache_l1: bool,
    pub only_cache_l2: bool,
    /// Expiry in seconds; `-1` keeps the template's expiries
    pub expire: i64,
}

impl Default for CacheableOptions {
    fn default() -> Self {
        Self {
            copy_default_config: true,
            strategy: DiscardStrategy::default(),
            only_cache_l1: false,
            only_cache_l2: false,
            expire: NEVER_EXPIRE,
        }
    }
}

impl CacheableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_default_config(mut self, copy: bool) -> Self {
        self.copy_default_config = copy;
        self
    }

    pub fn strategy(mut self, strategy: DiscardStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn only_cache_l1(mut self, only: bool) -> Self {
        self.only_cache_l1 = only;
        self
    }

    pub fn only_cache_l2(mut self, only: bool) -> Self {
        self.only_cache_l2 = only;
        self
    }

    pub fn expire(mut self, secs: i64) -> Self {
        self.expire = secs;
        self
    }

    /// Apply these options onto a freshly seeded configuration
    fn apply_to(&self, config: &mut CacheConfig) {
        config.strategy = self.strategy;
        config.only_cache_l1 = self.only_cache_l1;
        config.only_cache_l2 = self.only_cache_l2;
        if self.expire != NEVER_EXPIRE {
            config.l2_expire = self.expire;
            if self.strategy == DiscardStrategy::LazyExpire {
                config.l1_expire = self.expire;
            }
        }
    }
}

/// Registry of named caches holding values of type `V`
pub struct CacheRegistry<V, C = SystemClock>
where
    C: Clock,
{
    default: LightCache<V, C>,
    overrides: HashMap<String, CacheOverrides>,
    instances: DashMap<String, LightCache<V, C>>,
    store: Option<Arc<dyn L2Store>>,
    clock: C,
}

impl<V> CacheRegistry<V, SystemClock>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Registry of L1-only caches
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if the template is invalid.
    pub fn new(settings: LightSettings) -> Result<Self, CacheError> {
        Self::with_clock(settings, None, SystemClock)
    }

    /// Registry whose caches share one L2 store
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if the template is invalid.
    pub fn with_store(settings: LightSettings, store: Arc<dyn L2Store>) -> Result<Self, CacheError> {
        Self::with_clock(settings, Some(store), SystemClock)
    }
}

impl<V, C> CacheRegistry<V, C>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Clock + Clone,
{
    /// Registry with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if the template is invalid.
    pub fn with_clock(
        settings: LightSettings,
        store: Option<Arc<dyn L2Store>>,
        clock: C,
    ) -> Result<Self, CacheError> {
        let default =
            LightCache::with_clock(DEFAULT_CACHE_NAME, settings.defaults, store.clone(), clock.clone())?;
        Ok(Self {
            default,
            overrides: settings.instances,
            instances: DashMap::new(),
            store,
            clock,
        })
    }

    /// The template instance
    pub fn default_cache(&self) -> &LightCache<V, C> {
        &self.default
    }

    /// Look up a custom instance, or an inner instance created earlier
    pub fn resolve(&self, name: &str) -> Option<LightCache<V, C>> {
        if name == DEFAULT_CACHE_NAME {
            return Some(self.default.clone());
        }
        self.instances
            .get(name)
            .or_else(|| self.instances.get(&inner_name(name)))
            .map(|cache| cache.clone())
    }

    /// Register a custom instance under `name`; overrides configured for
    /// `name` are applied to it
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if the overrides make the
    /// configuration invalid; nothing is registered then.
    pub fn register(&self, name: &str, cache: LightCache<V, C>) -> Result<(), CacheError> {
        if let Some(overrides) = self.overrides.get(name) {
            cache.config_from(overrides)?;
        }
        debug!(cache = %name, "Custom cache registered");
        self.instances.insert(name.to_string(), cache);
        Ok(())
    }

    /// Return the instance for `name`, creating it on first use
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if the options or overrides
    /// produce an invalid configuration.
    pub fn resolve_or_create(
        &self,
        name: &str,
        options: &CacheableOptions,
    ) -> Result<LightCache<V, C>, CacheError> {
        if let Some(custom) = self.instances.get(name) {
            return Ok(custom.clone());
        }

        match self.instances.entry(inner_name(name)) {
            Entry::Occupied(slot) => Ok(slot.get().clone()),
            Entry::Vacant(slot) => {
                let cache = LightCache::with_clock(
                    slot.key().clone(),
                    CacheConfig::default(),
                    self.store.clone(),
                    self.clock.clone(),
                )?;
                let mut config = cache.config();
                if options.copy_default_config {
                    cache.copy_from(&self.default);
                    config = cache.config();
                    options.apply_to(&mut config);
                }
                if let Some(overrides) = self.overrides.get(name) {
                    overrides.apply_to(&mut config);
                }
                cache.set_config(config)?;

                debug!(cache = %slot.key(), strategy = %cache.strategy(), "Cache instance created");
                slot.insert(cache.clone());
                Ok(cache)
            }
        }
    }

    /// Read-through on the named cache under `prefix + id`
    ///
    /// # Errors
    /// `LightError::Cache(CacheError::MissingKey)` for an empty `id`, plus
    /// every error of [`LightCache::get`].
    pub fn cacheable<F, E>(
        &self,
        name: &str,
        options: &CacheableOptions,
        prefix: &str,
        id: &str,
        producer: F,
    ) -> Result<V, LightError<E>>
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = KeyGenerator::new(prefix).derive(id)?;
        self.resolve_or_create(name, options)?.get(&key, producer)
    }

    /// Write-through on the named cache under `prefix + id`
    ///
    /// # Errors
    /// As [`CacheRegistry::cacheable`], with the errors of
    /// [`LightCache::put`].
    pub fn cache_put<F, E>(
        &self,
        name: &str,
        options: &CacheableOptions,
        prefix: &str,
        id: &str,
        producer: F,
    ) -> Result<V, LightError<E>>
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = KeyGenerator::new(prefix).derive(id)?;
        self.resolve_or_create(name, options)?.put(&key, producer)
    }

    /// Cache-aside invalidation: run `action` against the source of truth,
    /// then erase `prefix + id`
    ///
    /// # Errors
    /// The key is checked before `action` runs. A failing `action` leaves
    /// the cache untouched.
    pub fn cache_evict<F, R, E>(
        &self,
        name: &str,
        options: &CacheableOptions,
        prefix: &str,
        id: &str,
        action: F,
    ) -> Result<R, LightError<E>>
    where
        F: FnOnce() -> Result<R, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = KeyGenerator::new(prefix).derive(id)?;
        let cache = self.resolve_or_create(name, options)?;
        let output = action().map_err(|source| LightError::ProducerFailed { source })?;
        cache.erase(&key)?;
        Ok(output)
    }

    /// Names of every registered or created instance
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn inner_name(name: &str) -> String {
    format!("{}{}", INNER_CACHE_PREFIX, name)
}
