//! Two-tier cache engine
//!
//! `LightCache` owns a bounded L1 map and an optional L2 store. Reads go
//! L1 -> L2 -> producer; writes go to every participating tier. Overflow is
//! handled inline by the active discard strategy before a new key is
//! inserted, so the map never holds more than `l1_max_count` spots between
//! complete calls.
//!
//! Locking:
//! - the L1 map is a sharded `DashMap`, a lookup only locks the key's shard
//! - ranking state is atomic on each spot, hits never take a write lock
//! - inserts into a bounded cache hold a per-instance discard guard so two
//!   writers cannot both squeeze into the last free slot
//! - every add or remove of a key in a bounded cache also holds that guard,
//!   and the reported size is a counter moved under it, never a shard scan
//! - producers run with no lock held

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lumen_common::time::{Clock, SystemClock};
use lumen_domain::{CacheConfig, CacheOverrides, DiscardStrategy};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::discard::{discard_for, Candidate, Discard, RankedMap};
use super::error::{CacheError, LightError};
use super::spot::{AccessStamp, Spot, SpotKind, SpotMeta};
use super::stats::{CacheStats, MetricsCollector};
use super::store::L2Store;

/// L1 map plus its size
///
/// `size` is adjusted while the key's shard is locked, so it never drops
/// below zero and never lags an insert it has already been told about.
struct SpotTable<V> {
    spots: DashMap<String, Arc<Spot<V>>>,
    size: AtomicUsize,
}

impl<V> SpotTable<V> {
    fn new() -> Self {
        Self { spots: DashMap::new(), size: AtomicUsize::new(0) }
    }

    fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Insert or replace; only a new key grows the size
    fn insert(&self, key: &str, spot: Arc<Spot<V>>) {
        match self.spots.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(spot);
            }
            Entry::Vacant(slot) => {
                let _held = slot.insert(spot);
                self.size.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Remove `key`, or only the spot born at `born` when given
    fn remove(&self, key: &str, born: Option<u64>) -> bool {
        match self.spots.entry(key.to_string()) {
            Entry::Occupied(slot) if born.map_or(true, |b| slot.get().meta().born() == b) => {
                self.size.fetch_sub(1, Ordering::AcqRel);
                slot.remove();
                true
            }
            _ => false,
        }
    }

    fn clear(&self) {
        let keys: Vec<String> = self.spots.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            self.remove(&key, None);
        }
    }
}

/// Active configuration paired with the strategy it selects
#[derive(Debug, Clone)]
struct Tuning {
    config: CacheConfig,
    discard: &'static dyn Discard,
}

impl Tuning {
    fn new(config: CacheConfig) -> Self {
        Self { discard: discard_for(config.strategy), config }
    }
}

/// `RankedMap` view over the L1 map handed to discard strategies
struct L1View<'a, V> {
    table: &'a SpotTable<V>,
}

impl<V> RankedMap for L1View<'_, V> {
    fn len(&self) -> usize {
        self.table.len()
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.table
            .spots
            .iter()
            .map(|entry| Candidate::of(entry.key(), entry.value().meta()))
            .collect()
    }

    fn evict(&self, candidate: &Candidate) -> bool {
        self.table.remove(&candidate.key, Some(candidate.born))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Named two-tier cache
///
/// # Type Parameters
/// - `V`: cached value; must be serde-encodable for the L2 tier
/// - `C`: clock used for expiry and access stamps (defaults to `SystemClock`)
///
/// Clones share the same maps, configuration and counters.
///
/// # Example
/// ```
/// use std::convert::Infallible;
///
/// use lumen_core::light::LightCache;
/// use lumen_domain::CacheConfig;
///
/// let cache: LightCache<String> = LightCache::new("users", CacheConfig::lru(100)).unwrap();
/// let name = cache.get("user:1", |_| Ok::<_, Infallible>("Ada".to_string())).unwrap();
/// assert_eq!(name, "Ada");
/// // Second read is served from L1 without calling the producer
/// let again = cache.get("user:1", |_| -> Result<String, Infallible> { unreachable!() }).unwrap();
/// assert_eq!(again, "Ada");
/// ```
pub struct LightCache<V, C = SystemClock>
where
    C: Clock,
{
    name: String,
    l1: Arc<SpotTable<V>>,
    tuning: Arc<RwLock<Tuning>>,
    store: Option<Arc<dyn L2Store>>,
    metrics: MetricsCollector,
    ticks: Arc<AtomicU64>,
    discard_guard: Arc<Mutex<()>>,
    clock: C,
}

impl<V> LightCache<V, SystemClock>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an L1-only cache
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if `config` fails
    /// validation.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Result<Self, CacheError> {
        Self::with_clock(name, config, None, SystemClock)
    }

    /// Create a cache backed by an L2 store
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if `config` fails
    /// validation.
    pub fn with_store(
        name: impl Into<String>,
        config: CacheConfig,
        store: Arc<dyn L2Store>,
    ) -> Result<Self, CacheError> {
        Self::with_clock(name, config, Some(store), SystemClock)
    }
}

impl<V, C> LightCache<V, C>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Clock + Clone,
{
    /// Create a cache with a custom clock (useful for testing)
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if `config` fails
    /// validation.
    pub fn with_clock(
        name: impl Into<String>,
        config: CacheConfig,
        store: Option<Arc<dyn L2Store>>,
        clock: C,
    ) -> Result<Self, CacheError> {
        let name = name.into();
        config.validate().map_err(|e| CacheError::invalid_config(&name, e))?;
        Ok(Self {
            name,
            l1: Arc::new(SpotTable::new()),
            tuning: Arc::new(RwLock::new(Tuning::new(config))),
            store,
            metrics: MetricsCollector::new(),
            ticks: Arc::new(AtomicU64::new(0)),
            discard_guard: Arc::new(Mutex::new(())),
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the active configuration
    pub fn config(&self) -> CacheConfig {
        self.tuning.read().config.clone()
    }

    pub fn strategy(&self) -> DiscardStrategy {
        self.tuning.read().discard.strategy()
    }

    /// Whether an L2 store is attached
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Read-through lookup
    ///
    /// L1 hit: ascend the spot and return. L1 miss: consult L2 and fill L1
    /// on a hit. Total miss: run `producer`, store the result in every
    /// participating tier and return it. A failing producer caches nothing.
    ///
    /// # Errors
    /// - `LightError::ProducerFailed` with the producer's error
    /// - `LightError::Cache` when the cache runs L2-only and the backend
    ///   fails (with L1 in play an L2 failure is treated as a miss)
    pub fn get<F, E>(&self, key: &str, producer: F) -> Result<V, LightError<E>>
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let tuning = self.tuning();
        let (use_l1, use_l2) = self.tiers(&tuning.config);

        if use_l1 {
            if let Some(value) = self.read_l1(key, &tuning) {
                return Ok(value);
            }
        }

        if use_l2 {
            match self.read_l2(key) {
                Ok(Some(value)) => {
                    if use_l1 {
                        self.write_l1(key, value.clone(), tuning.config.l1_ttl(), &tuning);
                    }
                    return Ok(value);
                }
                Ok(None) => {}
                Err(err) if !use_l1 => return Err(err.into()),
                Err(err) => {
                    warn!(cache = %self.name, key = %key, error = %err, "L2 read failed, treating as miss");
                }
            }
        }

        let value = producer(key).map_err(|source| LightError::ProducerFailed { source })?;

        if use_l1 {
            self.write_l1(key, value.clone(), tuning.config.l1_ttl(), &tuning);
        }
        if use_l2 {
            if let Err(err) = self.write_l2(key, &value, tuning.config.l2_ttl()) {
                warn!(cache = %self.name, key = %key, error = %err, "L2 write failed after produce");
            }
        }
        Ok(value)
    }

    /// Write-through: always run `producer`, then overwrite every tier
    ///
    /// # Errors
    /// - `LightError::ProducerFailed` with the producer's error
    /// - `LightError::Cache` when the L2 write fails; the L1 entry for `key`
    ///   is dropped so neither tier serves a stale value
    pub fn put<F, E>(&self, key: &str, producer: F) -> Result<V, LightError<E>>
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let value = producer(key).map_err(|source| LightError::ProducerFailed { source })?;
        self.store_value(key, value.clone(), None)?;
        Ok(value)
    }

    /// Store a value directly with the configured expiries
    ///
    /// # Errors
    /// Returns the L2 failure, as `put` does.
    pub fn set(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.store_value(key, value, None)
    }

    /// Store a value that expires after `ttl` in every tier, whatever the
    /// strategy
    ///
    /// # Errors
    /// Returns the L2 failure, as `put` does.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.store_value(key, value, Some(ttl))
    }

    /// Remove `key` from every participating tier; absent keys are a no-op
    ///
    /// # Errors
    /// Returns the L2 backend's delete failure.
    pub fn erase(&self, key: &str) -> Result<(), CacheError> {
        let config = self.config();
        let (use_l1, use_l2) = self.tiers(&config);
        if use_l1 {
            let _guard = self.membership_guard(&config);
            self.l1.remove(key, None);
        }
        if use_l2 {
            if let Some(store) = &self.store {
                store.delete(key)?;
            }
        }
        Ok(())
    }

    /// Read L1 without ranking the spot or falling through to L2
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.millis_since_epoch();
        let entry = self.l1.spots.get(key)?;
        let spot = entry.value();
        if spot.meta().is_expired(now) {
            return None;
        }
        Some(spot.value().clone())
    }

    /// Atomically replace the L1 value under `key`
    ///
    /// `f` receives the live value (`None` when absent or expired) and
    /// returns the new one. A live spot keeps its expiry; a fresh spot
    /// expires after `ttl`, or the L1 TTL when `ttl` is `None`. Only L1 is
    /// touched. `f` runs under the key's shard lock and must not call back
    /// into this cache.
    pub fn update_with<F>(&self, key: &str, ttl: Option<Duration>, f: F) -> V
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let tuning = self.tuning();
        let now = self.clock.millis_since_epoch();
        let ttl = ttl.or_else(|| tuning.config.l1_ttl());
        let _guard = self.make_room(key, now, &tuning);

        let (value, created) = match self.l1.spots.entry(key.to_string()) {
            Entry::Occupied(mut slot) if !slot.get().meta().is_expired(now) => {
                let current = Arc::clone(slot.get());
                let value = f(Some(current.value()));
                let meta = self.conform_meta(key, current.meta(), &tuning);
                tuning.discard.ascend(&meta, self.stamp(now));
                slot.insert(Arc::new(Spot::new(key, value.clone(), meta)));
                (value, false)
            }
            Entry::Occupied(mut slot) => {
                let value = f(None);
                slot.insert(Arc::new(self.fresh_spot(key, value.clone(), now, ttl, &tuning)));
                self.metrics.record_expirations(1);
                (value, true)
            }
            Entry::Vacant(slot) => {
                let value = f(None);
                let spot = Arc::new(self.fresh_spot(key, value.clone(), now, ttl, &tuning));
                let _held = slot.insert(spot);
                self.l1.size.fetch_add(1, Ordering::AcqRel);
                (value, true)
            }
        };

        if created {
            self.metrics.record_miss();
        } else {
            self.metrics.record_hit();
        }
        self.metrics.record_insert();
        value
    }

    /// Copy configuration (not data) from another cache
    pub fn copy_from<W, D>(&self, other: &LightCache<W, D>)
    where
        W: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        D: Clock + Clone,
    {
        *self.tuning.write() = Tuning::new(other.config());
    }

    /// Apply externally supplied overrides on top of the current
    /// configuration
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` and keeps the current
    /// configuration if the result fails validation.
    pub fn config_from(&self, overrides: &CacheOverrides) -> Result<(), CacheError> {
        let mut config = self.config();
        overrides.apply_to(&mut config);
        self.set_config(config)
    }

    /// Replace the configuration
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if `config` fails
    /// validation.
    pub fn set_config(&self, config: CacheConfig) -> Result<(), CacheError> {
        config.validate().map_err(|e| CacheError::invalid_config(&self.name, e))?;
        *self.tuning.write() = Tuning::new(config);
        Ok(())
    }

    /// Switch the discard strategy; stored spots are reshaped as they are
    /// touched
    pub fn set_strategy(&self, strategy: DiscardStrategy) {
        let mut tuning = self.tuning.write();
        tuning.config.strategy = strategy;
        tuning.discard = discard_for(strategy);
        debug!(cache = %self.name, strategy = %strategy, "Discard strategy switched");
    }

    /// Number of L1 spots, expired ones included until touched
    ///
    /// Never above `l1_max_count`, even while other threads are inserting.
    pub fn len(&self) -> usize {
        self.l1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every L1 spot; L2 is left alone
    pub fn clear(&self) {
        let _guard = self.membership_guard(&self.config());
        self.l1.clear();
    }

    /// Remove every expired L1 spot
    ///
    /// Returns the number of spots removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.millis_since_epoch();
        let _guard = self.membership_guard(&self.config());
        let view = L1View { table: &*self.l1 };
        let removed = view
            .candidates()
            .into_iter()
            .filter(|c| c.is_expired(now))
            .filter(|c| view.evict(c))
            .count();
        self.metrics.record_expirations(removed);
        trace!(cache = %self.name, removed, "Purged expired spots");
        removed
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config().l1_max_count)
    }

    fn tuning(&self) -> Tuning {
        self.tuning.read().clone()
    }

    /// Participating tiers; without a store the cache falls back to L1
    fn tiers(&self, config: &CacheConfig) -> (bool, bool) {
        match self.store {
            Some(_) => (config.uses_l1(), config.uses_l2()),
            None => (true, false),
        }
    }

    fn next_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn stamp(&self, now: u64) -> AccessStamp {
        AccessStamp { at_millis: now, seq: self.next_tick() }
    }

    fn read_l1(&self, key: &str, tuning: &Tuning) -> Option<V> {
        let now = self.clock.millis_since_epoch();
        let Some(spot) = self.l1.spots.get(key).map(|entry| Arc::clone(entry.value())) else {
            self.metrics.record_miss();
            return None;
        };

        if spot.meta().is_expired(now) {
            let _guard = self.membership_guard(&tuning.config);
            if self.l1.remove(key, Some(spot.meta().born())) {
                self.metrics.record_expirations(1);
                trace!(cache = %self.name, key = %key, "Expired spot removed on access");
            }
            self.metrics.record_miss();
            return None;
        }

        let spot = self.conform(key, spot, tuning);
        tuning.discard.ascend(spot.meta(), self.stamp(now));
        self.metrics.record_hit();
        Some(spot.value().clone())
    }

    /// Reshape a spot written under another strategy and store it back,
    /// unless the key has been rewritten meanwhile
    fn conform(&self, key: &str, spot: Arc<Spot<V>>, tuning: &Tuning) -> Arc<Spot<V>> {
        if spot.meta().kind() == tuning.discard.spot_kind() {
            return spot;
        }
        let reshaped = Arc::new(spot.with_meta(self.conform_meta(key, spot.meta(), tuning)));
        if let Some(mut slot) = self.l1.spots.get_mut(key) {
            if slot.meta().born() == spot.meta().born() {
                *slot = Arc::clone(&reshaped);
                return reshaped;
            }
        }
        spot
    }

    fn conform_meta(&self, key: &str, meta: &SpotMeta, tuning: &Tuning) -> SpotMeta {
        if meta.kind() == tuning.discard.spot_kind() {
            return meta.clone();
        }
        let meta = tuning.discard.deform(key, meta);
        match (meta.kind(), meta.expire_at(), tuning.config.l1_ttl()) {
            (SpotKind::Expire, None, Some(ttl)) => {
                meta.with_expire_at(Some(meta.created_at().saturating_add(ttl_millis(ttl))))
            }
            _ => meta,
        }
    }

    fn fresh_spot(
        &self,
        key: &str,
        value: V,
        now: u64,
        ttl: Option<Duration>,
        tuning: &Tuning,
    ) -> Spot<V> {
        let expire_at = ttl.map(|ttl| now.saturating_add(ttl_millis(ttl)));
        let plain = SpotMeta::plain(self.next_tick(), now, expire_at);
        Spot::new(key, value, tuning.discard.deform(key, &plain))
    }

    fn write_l1(&self, key: &str, value: V, ttl: Option<Duration>, tuning: &Tuning) {
        let now = self.clock.millis_since_epoch();
        let spot = Arc::new(self.fresh_spot(key, value, now, ttl, tuning));
        let _guard = self.make_room(key, now, tuning);
        self.l1.insert(key, spot);
        self.metrics.record_insert();
    }

    /// Guard held around any key add or remove in a bounded cache
    fn membership_guard(&self, config: &CacheConfig) -> Option<MutexGuard<'_, ()>> {
        config.l1_max_count.map(|_| self.discard_guard.lock())
    }

    /// Run discard passes until a new key fits
    ///
    /// The returned guard must be held until the insert is done.
    fn make_room(&self, key: &str, now: u64, tuning: &Tuning) -> Option<MutexGuard<'_, ()>> {
        let max = tuning.config.l1_max_count?;
        let guard = self.discard_guard.lock();
        if !self.l1.spots.contains_key(key) {
            while self.l1.len() >= max {
                if self.run_discard(now, tuning) == 0 {
                    break;
                }
            }
        }
        Some(guard)
    }

    fn run_discard(&self, now: u64, tuning: &Tuning) -> usize {
        let before = self.l1.len();
        let view = L1View { table: &*self.l1 };
        let removed = tuning.discard.discard(&view, tuning.config.l1_discard_percent, now);
        self.metrics.record_evictions(removed);
        debug!(
            cache = %self.name,
            strategy = %tuning.discard.strategy(),
            before,
            removed,
            "Discard pass"
        );
        removed
    }

    fn read_l2(&self, key: &str) -> Result<Option<V>, CacheError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let bytes = match store.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.metrics.record_l2_miss();
                return Ok(None);
            }
            Err(err) => {
                self.metrics.record_l2_miss();
                return Err(err.into());
            }
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            self.metrics.record_l2_miss();
            CacheError::serialization(key, &e)
        })?;
        self.metrics.record_l2_hit();
        Ok(Some(value))
    }

    fn write_l2(&self, key: &str, value: &V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::serialization(key, &e))?;
        store.write(key, &bytes, ttl)?;
        Ok(())
    }

    /// L2 first, then L1; an L2 failure leaves no L1 copy behind
    fn store_value(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let tuning = self.tuning();
        let (use_l1, use_l2) = self.tiers(&tuning.config);

        if use_l2 {
            if let Err(err) = self.write_l2(key, &value, ttl.or_else(|| tuning.config.l2_ttl())) {
                if use_l1 {
                    let _guard = self.membership_guard(&tuning.config);
                    self.l1.remove(key, None);
                }
                return Err(err);
            }
        }
        if use_l1 {
            self.write_l1(key, value, ttl.or_else(|| tuning.config.l1_ttl()), &tuning);
        }
        Ok(())
    }
}

impl<V, C> Clone for LightCache<V, C>
where
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            l1: Arc::clone(&self.l1),
            tuning: Arc::clone(&self.tuning),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            ticks: Arc::clone(&self.ticks),
            discard_guard: Arc::clone(&self.discard_guard),
            clock: self.clock.clone(),
        }
    }
}

impl<V, C> fmt::Debug for LightCache<V, C>
where
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightCache")
            .field("name", &self.name)
            .field("len", &self.l1.len())
            .field("config", &self.tuning.read().config)
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}
