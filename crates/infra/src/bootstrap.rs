//! Registry wiring
//!
//! Builds the cache registry and the limiter registry from one [`Settings`]
//! value, sharing a single L2 store across cache instances.

use std::fmt::Debug;
use std::sync::Arc;

use lumen_common::time::{Clock, SystemClock};
use lumen_core::light::{CacheError, CacheRegistry, L2Store};
use lumen_core::particle::LimiterRegistry;
use lumen_domain::{LumenError, Settings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config;

/// Bootstrap failure
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Settings could not be loaded or are invalid
    #[error(transparent)]
    Settings(#[from] LumenError),

    /// A registry rejected its configuration
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Cache and limiter registries built from settings
pub struct Lumen<V, C = SystemClock>
where
    C: Clock,
{
    settings: Settings,
    caches: CacheRegistry<V, C>,
    limiters: LimiterRegistry,
}

impl<V> Lumen<V, SystemClock>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Load settings with [`config::load`] and build both registries
    ///
    /// # Errors
    /// Returns `BootstrapError::Settings` if loading fails and
    /// `BootstrapError::Cache` if a registry cannot be built.
    pub fn load(store: Option<Arc<dyn L2Store>>) -> Result<Self, BootstrapError> {
        Self::from_settings(config::load()?, store)
    }

    /// Build both registries from `settings`
    ///
    /// # Errors
    /// As [`Lumen::load`], without the loading step.
    pub fn from_settings(
        settings: Settings,
        store: Option<Arc<dyn L2Store>>,
    ) -> Result<Self, BootstrapError> {
        Self::with_clock(settings, store, SystemClock)
    }
}

impl<V, C> Lumen<V, C>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Clock + Clone + Debug,
{
    /// Build both registries on a custom clock
    ///
    /// # Errors
    /// As [`Lumen::from_settings`].
    pub fn with_clock(
        settings: Settings,
        store: Option<Arc<dyn L2Store>>,
        clock: C,
    ) -> Result<Self, BootstrapError> {
        settings.validate()?;

        let caches = CacheRegistry::with_clock(settings.light.clone(), store.clone(), clock.clone())?;
        let limiters = LimiterRegistry::with_clock(&settings.particle, clock)?;

        tracing::info!(
            l2 = store.as_ref().map(|s| s.name()).unwrap_or("none"),
            instances = settings.light.instances.len(),
            limiters = limiters.len(),
            "Lumen registries ready"
        );
        Ok(Self { settings, caches, limiters })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn caches(&self) -> &CacheRegistry<V, C> {
        &self.caches
    }

    pub fn limiters(&self) -> &LimiterRegistry {
        &self.limiters
    }
}
