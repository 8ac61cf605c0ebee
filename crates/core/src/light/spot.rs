//! Spot: the envelope stored per L1 key
//!
//! A spot carries the cached value plus the metadata discard strategies rank
//! on. Ranking fields are atomics so a hit can `ascend` a spot through a
//! shared `Arc` while an eviction pass scans the same map.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shape of a spot's metadata, one per discard strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotKind {
    /// Freshly built, not yet adapted to a strategy
    Plain,
    /// Ranked by recency (LRU)
    Timeline,
    /// Ranked by hit count (LFU)
    Hot,
    /// Unranked, expires lazily
    Expire,
}

/// A point in the cache's access history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessStamp {
    /// Wall time of the access in millis since the epoch
    pub at_millis: u64,
    /// Cache-wide monotonic sequence number of the access
    pub seq: u64,
}

/// Per-spot metadata
#[derive(Debug)]
pub struct SpotMeta {
    kind: SpotKind,
    born: u64,
    created_at: u64,
    expire_at: Option<u64>,
    last_access: AtomicU64,
    rank: AtomicU64,
}

impl SpotMeta {
    /// Metadata of a spot that no strategy has adapted yet
    pub fn plain(born: u64, created_at: u64, expire_at: Option<u64>) -> Self {
        Self {
            kind: SpotKind::Plain,
            born,
            created_at,
            expire_at,
            last_access: AtomicU64::new(created_at),
            rank: AtomicU64::new(0),
        }
    }

    /// Copy of this metadata with a new kind and rank; identity, timestamps
    /// and expiry are preserved
    pub fn reshaped(&self, kind: SpotKind, rank: u64) -> Self {
        Self {
            kind,
            born: self.born,
            created_at: self.created_at,
            expire_at: self.expire_at,
            last_access: AtomicU64::new(self.last_access()),
            rank: AtomicU64::new(rank),
        }
    }

    /// Copy of this metadata with a different expiry
    pub fn with_expire_at(&self, expire_at: Option<u64>) -> Self {
        Self { expire_at, ..self.reshaped(self.kind, self.rank()) }
    }

    pub fn kind(&self) -> SpotKind {
        self.kind
    }

    /// Insertion sequence number; identifies this spot in the map
    pub fn born(&self) -> u64 {
        self.born
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn expire_at(&self) -> Option<u64> {
        self.expire_at
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn rank(&self) -> u64 {
        self.rank.load(Ordering::Relaxed)
    }

    /// Whether the spot's expiry has passed at `now` (millis)
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at.is_some_and(|at| now >= at)
    }

    /// Record an access time; never moves the timestamp backwards
    pub fn touch(&self, at_millis: u64) {
        self.last_access.fetch_max(at_millis, Ordering::Relaxed);
    }

    /// Raise the rank to at least `rank`
    pub fn raise_rank(&self, rank: u64) {
        self.rank.fetch_max(rank, Ordering::Relaxed);
    }

    /// Add one to the rank
    pub fn bump_rank(&self) {
        self.rank.fetch_add(1, Ordering::Relaxed);
    }
}

impl Clone for SpotMeta {
    fn clone(&self) -> Self {
        self.reshaped(self.kind, self.rank())
    }
}

/// Cached value with its metadata
#[derive(Debug)]
pub struct Spot<V> {
    key: String,
    value: V,
    meta: SpotMeta,
}

impl<V> Spot<V> {
    pub fn new(key: impl Into<String>, value: V, meta: SpotMeta) -> Self {
        Self { key: key.into(), value, meta }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn meta(&self) -> &SpotMeta {
        &self.meta
    }
}

impl<V: Clone> Spot<V> {
    /// Same key and value under different metadata
    pub fn with_meta(&self, meta: SpotMeta) -> Self {
        Self { key: self.key.clone(), value: self.value.clone(), meta }
    }
}
