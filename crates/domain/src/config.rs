//! Configuration records for cache instances and limiters
//!
//! Keys are accepted in the camelCase form used by existing configuration
//! files (`l1MaxCount`, `onlyCacheL1`) as well as snake_case.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_L1_DISCARD_PERCENT, DEFAULT_L1_EXPIRE_SECS, DEFAULT_L1_MAX_COUNT,
    DEFAULT_LIMITER_EXPIRE_SECS, NEVER_EXPIRE, PARTICLE_KEY_PREFIX,
};
use crate::errors::{LumenError, Result};

/// Discard (eviction) strategy tag for an L1 tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DiscardStrategy {
    /// Least recently used: ranks spots by their last access
    #[serde(rename = "LRU", alias = "lru", alias = "Timeline", alias = "timeline")]
    Lru,
    /// Least frequently used: ranks spots by their hit count
    #[default]
    #[serde(rename = "LFU", alias = "lfu", alias = "Hot", alias = "hot")]
    Lfu,
    /// No ranking; spots expire lazily after `l1Expire`
    #[serde(rename = "LazyExpire", alias = "lazy-expire", alias = "lazy_expire")]
    LazyExpire,
}

impl fmt::Display for DiscardStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "LRU"),
            Self::Lfu => write!(f, "LFU"),
            Self::LazyExpire => write!(f, "LazyExpire"),
        }
    }
}

impl FromStr for DiscardStrategy {
    type Err = LumenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" | "timeline" => Ok(Self::Lru),
            "lfu" | "hot" => Ok(Self::Lfu),
            "lazyexpire" | "lazy-expire" | "lazy_expire" => Ok(Self::LazyExpire),
            other => Err(LumenError::InvalidInput(format!("Unknown discard strategy: {}", other))),
        }
    }
}

/// Converts an expiry in seconds into a TTL; `-1` (and `0`) mean "never"
pub fn expire_to_ttl(expire_secs: i64) -> Option<Duration> {
    if expire_secs > 0 {
        Some(Duration::from_secs(expire_secs as u64))
    } else {
        None
    }
}

/// Configuration of one named cache instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of L1 entries (None = unbounded, never discards)
    #[serde(alias = "l1_max_count")]
    pub l1_max_count: Option<usize>,

    /// Fraction of L1 entries dropped per discard pass, in (0, 1]
    #[serde(alias = "l1_discard_percent")]
    pub l1_discard_percent: f32,

    /// L1 expiry in seconds for the LazyExpire strategy (-1 = never)
    #[serde(alias = "l1_expire")]
    pub l1_expire: i64,

    /// L2 expiry in seconds (-1 = never)
    #[serde(alias = "l2_expire")]
    pub l2_expire: i64,

    /// Only use the L1 tier (wins over `only_cache_l2`)
    #[serde(alias = "only_cache_l1")]
    pub only_cache_l1: bool,

    /// Only use the L2 tier
    #[serde(alias = "only_cache_l2")]
    pub only_cache_l2: bool,

    /// Discard strategy of the L1 tier
    pub strategy: DiscardStrategy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_max_count: Some(DEFAULT_L1_MAX_COUNT),
            l1_discard_percent: DEFAULT_L1_DISCARD_PERCENT,
            l1_expire: DEFAULT_L1_EXPIRE_SECS,
            l2_expire: NEVER_EXPIRE,
            only_cache_l1: false,
            only_cache_l2: false,
            strategy: DiscardStrategy::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for a bounded, L1-only LRU cache
    pub fn lru(max_count: usize) -> Self {
        Self {
            l1_max_count: Some(max_count),
            only_cache_l1: true,
            strategy: DiscardStrategy::Lru,
            ..Self::default()
        }
    }

    /// Quick preset for a bounded, L1-only LFU cache
    pub fn lfu(max_count: usize) -> Self {
        Self {
            l1_max_count: Some(max_count),
            only_cache_l1: true,
            strategy: DiscardStrategy::Lfu,
            ..Self::default()
        }
    }

    /// Quick preset for an unbounded, L1-only cache expiring after `expire_secs`
    pub fn lazy_expire(expire_secs: i64) -> Self {
        Self {
            l1_max_count: None,
            l1_expire: expire_secs,
            only_cache_l1: true,
            strategy: DiscardStrategy::LazyExpire,
            ..Self::default()
        }
    }

    /// Whether the L1 tier participates (`only_cache_l1` wins over
    /// `only_cache_l2`)
    pub fn uses_l1(&self) -> bool {
        self.only_cache_l1 || !self.only_cache_l2
    }

    /// Whether the L2 tier participates
    pub fn uses_l2(&self) -> bool {
        !self.only_cache_l1
    }

    /// L1 time-to-live; only the LazyExpire strategy expires L1 by time
    pub fn l1_ttl(&self) -> Option<Duration> {
        match self.strategy {
            DiscardStrategy::LazyExpire => expire_to_ttl(self.l1_expire),
            DiscardStrategy::Lru | DiscardStrategy::Lfu => None,
        }
    }

    /// L2 time-to-live
    pub fn l2_ttl(&self) -> Option<Duration> {
        expire_to_ttl(self.l2_expire)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `LumenError::Config` for a zero capacity, a discard percent
    /// outside `(0, 1]`, or an expiry below `-1`.
    pub fn validate(&self) -> Result<()> {
        if self.l1_max_count == Some(0) {
            return Err(LumenError::Config("l1MaxCount must be greater than 0".to_string()));
        }
        if !(self.l1_discard_percent > 0.0 && self.l1_discard_percent <= 1.0) {
            return Err(LumenError::Config(format!(
                "l1DiscardPercent must be in (0, 1], got {}",
                self.l1_discard_percent
            )));
        }
        if self.l1_expire < NEVER_EXPIRE || self.l2_expire < NEVER_EXPIRE {
            return Err(LumenError::Config("expire values must be -1 or positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of L1 entries
    pub fn l1_max_count(mut self, count: usize) -> Self {
        self.config.l1_max_count = Some(count);
        self
    }

    /// Remove the L1 bound
    pub fn unbounded(mut self) -> Self {
        self.config.l1_max_count = None;
        self
    }

    /// Set the discard percent
    pub fn l1_discard_percent(mut self, percent: f32) -> Self {
        self.config.l1_discard_percent = percent;
        self
    }

    /// Set the L1 expiry in seconds
    pub fn l1_expire(mut self, secs: i64) -> Self {
        self.config.l1_expire = secs;
        self
    }

    /// Set the L2 expiry in seconds
    pub fn l2_expire(mut self, secs: i64) -> Self {
        self.config.l2_expire = secs;
        self
    }

    /// Only use the L1 tier
    pub fn only_cache_l1(mut self, only: bool) -> Self {
        self.config.only_cache_l1 = only;
        self
    }

    /// Only use the L2 tier
    pub fn only_cache_l2(mut self, only: bool) -> Self {
        self.config.only_cache_l2 = only;
        self
    }

    /// Set the discard strategy
    pub fn strategy(mut self, strategy: DiscardStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

/// Externally supplied per-instance overrides; every set field wins over the
/// template-copied value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheOverrides {
    #[serde(alias = "l1_max_count")]
    pub l1_max_count: Option<usize>,
    #[serde(alias = "l1_discard_percent")]
    pub l1_discard_percent: Option<f32>,
    #[serde(alias = "l1_expire")]
    pub l1_expire: Option<i64>,
    #[serde(alias = "l2_expire")]
    pub l2_expire: Option<i64>,
    #[serde(alias = "only_cache_l1")]
    pub only_cache_l1: Option<bool>,
    #[serde(alias = "only_cache_l2")]
    pub only_cache_l2: Option<bool>,
    pub strategy: Option<DiscardStrategy>,
}

impl CacheOverrides {
    /// Apply every set field onto `config`
    pub fn apply_to(&self, config: &mut CacheConfig) {
        if let Some(count) = self.l1_max_count {
            config.l1_max_count = Some(count);
        }
        if let Some(percent) = self.l1_discard_percent {
            config.l1_discard_percent = percent;
        }
        if let Some(expire) = self.l1_expire {
            config.l1_expire = expire;
        }
        if let Some(expire) = self.l2_expire {
            config.l2_expire = expire;
        }
        if let Some(only) = self.only_cache_l1 {
            config.only_cache_l1 = only;
        }
        if let Some(only) = self.only_cache_l2 {
            config.only_cache_l2 = only;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
    }
}

/// Cache settings: the default template plus named instance overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightSettings {
    /// Template copied into instances created on first use
    pub defaults: CacheConfig,

    /// Per-instance overrides keyed by instance name
    pub instances: HashMap<String, CacheOverrides>,
}

impl LightSettings {
    /// Validate the template and every overridden instance
    ///
    /// # Errors
    /// Returns the first `LumenError::Config` found, naming the instance.
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        for (name, overrides) in &self.instances {
            let mut config = self.defaults.clone();
            overrides.apply_to(&mut config);
            config.validate().map_err(|e| {
                LumenError::Config(format!("cache instance '{}': {}", name, e))
            })?;
        }
        Ok(())
    }
}

/// Limiter policy tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterKind {
    /// Single use per identifier and window
    Idempotent,
    /// Fixed number of calls per identifier and window
    Times,
    /// Ordered composition of other limiters
    Barrier,
}

impl fmt::Display for LimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idempotent => write!(f, "idempotent"),
            Self::Times => write!(f, "times"),
            Self::Barrier => write!(f, "barrier"),
        }
    }
}

/// Counting window of a times limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimesWindow {
    Second,
    Minute,
    Hour,
    #[default]
    Day,
}

impl TimesWindow {
    /// Length of the window
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3_600),
            Self::Day => Duration::from_secs(86_400),
        }
    }
}

fn default_key_expire() -> u64 {
    DEFAULT_LIMITER_EXPIRE_SECS
}

/// Declaration of one named limiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterSpec {
    /// Unique limiter name
    pub name: String,

    /// Policy
    #[serde(rename = "type", alias = "kind")]
    pub kind: LimiterKind,

    /// Prefix of the state keys (defaults to `particle:<name>:`)
    #[serde(default, alias = "key_prefix")]
    pub key_prefix: Option<String>,

    /// Default window of an idempotent limiter, in seconds
    #[serde(default = "default_key_expire", alias = "key_expire")]
    pub key_expire: u64,

    /// Ceiling of a times limiter
    #[serde(default, alias = "limit_times")]
    pub limit_times: u64,

    /// Window of a times limiter
    #[serde(default)]
    pub window: TimesWindow,

    /// Member limiter names of a barrier, evaluated in list order
    #[serde(default)]
    pub chain: Vec<String>,

    /// Registration order; lower values are built first
    #[serde(default)]
    pub order: i32,
}

impl LimiterSpec {
    /// Spec of an idempotent limiter
    pub fn idempotent(name: impl Into<String>, key_expire: u64) -> Self {
        Self {
            name: name.into(),
            kind: LimiterKind::Idempotent,
            key_prefix: None,
            key_expire,
            limit_times: 0,
            window: TimesWindow::default(),
            chain: Vec::new(),
            order: 0,
        }
    }

    /// Spec of a times limiter
    pub fn times(name: impl Into<String>, limit_times: u64, window: TimesWindow) -> Self {
        Self { kind: LimiterKind::Times, limit_times, window, ..Self::idempotent(name, 0) }
    }

    /// Spec of a barrier over `chain`
    pub fn barrier<I, S>(name: impl Into<String>, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: LimiterKind::Barrier,
            chain: chain.into_iter().map(Into::into).collect(),
            ..Self::idempotent(name, DEFAULT_LIMITER_EXPIRE_SECS)
        }
    }

    /// Prefix prepended to identifiers to form state keys
    pub fn resolved_key_prefix(&self) -> String {
        self.key_prefix
            .clone()
            .unwrap_or_else(|| format!("{}{}:", PARTICLE_KEY_PREFIX, self.name))
    }

    /// Validate the spec on its own
    ///
    /// # Errors
    /// Returns `LumenError::Config` for an empty name, a times limiter
    /// without a ceiling, or a barrier without members.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LumenError::Config("limiter name must not be empty".to_string()));
        }
        match self.kind {
            LimiterKind::Times if self.limit_times == 0 => Err(LumenError::Config(format!(
                "times limiter '{}' needs limitTimes greater than 0",
                self.name
            ))),
            LimiterKind::Barrier if self.chain.is_empty() => Err(LumenError::Config(format!(
                "barrier limiter '{}' has an empty chain",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Unbounded, so a live marker or counter is never discarded to make room;
/// closed windows leave on touch or through a purge
fn default_limiter_store() -> CacheConfig {
    CacheConfig {
        l1_max_count: None,
        only_cache_l1: true,
        strategy: DiscardStrategy::LazyExpire,
        ..CacheConfig::default()
    }
}

/// Limiter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleSettings {
    /// Configuration of each limiter's state store
    pub store: CacheConfig,

    /// Declared limiters
    pub limiters: Vec<LimiterSpec>,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self { store: default_limiter_store(), limiters: Vec::new() }
    }
}

impl ParticleSettings {
    /// Limiter specs sorted by `order`, keeping declaration order on ties
    pub fn ordered(&self) -> Vec<&LimiterSpec> {
        let mut specs: Vec<&LimiterSpec> = self.limiters.iter().collect();
        specs.sort_by_key(|spec| spec.order);
        specs
    }

    /// Validate the specs and the barrier wiring
    ///
    /// # Errors
    /// Returns `LumenError::Config` for duplicate names, invalid specs, or a
    /// barrier that references an unknown limiter or another barrier.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        let mut names = HashSet::new();
        for spec in &self.limiters {
            spec.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(LumenError::Config(format!("duplicate limiter name '{}'", spec.name)));
            }
        }
        for spec in self.limiters.iter().filter(|s| s.kind == LimiterKind::Barrier) {
            for member in &spec.chain {
                match self.limiters.iter().find(|s| &s.name == member) {
                    None => {
                        return Err(LumenError::Config(format!(
                            "barrier '{}' references unknown limiter '{}'",
                            spec.name, member
                        )))
                    }
                    Some(found) if found.kind == LimiterKind::Barrier => {
                        return Err(LumenError::Config(format!(
                            "barrier '{}' cannot contain barrier '{}'",
                            spec.name, member
                        )))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

/// Top-level settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cache engine settings
    pub light: LightSettings,

    /// Limiter settings
    pub particle: ParticleSettings,
}

impl Settings {
    /// Validate every section
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.light.validate()?;
        self.particle.validate()
    }
}
