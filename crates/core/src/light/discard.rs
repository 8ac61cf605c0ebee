//! Discard strategies
//!
//! A strategy is a stateless policy object. All ranking state lives on the
//! spots, so one `'static` instance per strategy is shared by every cache
//! (see [`discard_for`]).
//!
//! | Strategy | Spot kind | `ascend` | `discard` |
//! |----------|-----------|----------|-----------|
//! | LRU | `Timeline` | rank = access sequence | lowest rank first |
//! | LFU | `Hot` | rank += 1 | lowest rank first, oldest access on ties |
//! | LazyExpire | `Expire` | no-op | every expired spot, else oldest inserted |

use std::fmt::Debug;

use lumen_domain::DiscardStrategy;

use super::spot::{AccessStamp, SpotKind, SpotMeta};

/// Snapshot of a spot taken by an eviction scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub born: u64,
    pub rank: u64,
    pub last_access: u64,
    pub expire_at: Option<u64>,
}

impl Candidate {
    /// Snapshot `meta` stored under `key`
    pub fn of(key: &str, meta: &SpotMeta) -> Self {
        Self {
            key: key.to_string(),
            born: meta.born(),
            rank: meta.rank(),
            last_access: meta.last_access(),
            expire_at: meta.expire_at(),
        }
    }

    /// Whether the snapshot's expiry has passed at `now`
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at.is_some_and(|at| now >= at)
    }
}

/// The view of an L1 map a strategy evicts from
pub trait RankedMap {
    /// Current number of spots
    fn len(&self) -> usize;

    /// Copy of every spot's ranking state
    fn candidates(&self) -> Vec<Candidate>;

    /// Remove the candidate's key, but only while the stored spot is still
    /// the one that was scanned; returns whether it was removed
    fn evict(&self, candidate: &Candidate) -> bool;
}

/// Pluggable eviction policy
pub trait Discard: Send + Sync + Debug {
    /// Tag this strategy is selected by
    fn strategy(&self) -> DiscardStrategy;

    /// Spot kind this strategy ranks
    fn spot_kind(&self) -> SpotKind;

    /// Adapt metadata of another kind to this strategy; the payload is never
    /// touched
    fn deform(&self, key: &str, meta: &SpotMeta) -> SpotMeta;

    /// Update ranking state on a hit
    fn ascend(&self, meta: &SpotMeta, stamp: AccessStamp);

    /// Remove a `percent` share of the map; returns the number removed
    fn discard(&self, map: &dyn RankedMap, percent: f32, now: u64) -> usize;
}

/// `ceil(size * percent)`, clamped to `[1, size]`
pub fn victim_count(size: usize, percent: f32) -> usize {
    if size == 0 {
        return 0;
    }
    // f32 -> f64 widening leaves noise like 0.1 -> 0.10000000149
    let share = (size as f64 * f64::from(percent) - 1e-6).ceil();
    (share.max(1.0) as usize).min(size)
}

/// Evict the `count` lowest ranked candidates, oldest access first on ties
fn discard_lowest_ranked(map: &dyn RankedMap, count: usize) -> usize {
    let mut candidates = map.candidates();
    candidates.sort_by(|a, b| {
        (a.rank, a.last_access, a.born).cmp(&(b.rank, b.last_access, b.born))
    });
    candidates.iter().take(count).filter(|c| map.evict(c)).count()
}

/// LRU: recency ranking
#[derive(Debug, Default, Clone, Copy)]
pub struct TimelineDiscard;

impl Discard for TimelineDiscard {
    fn strategy(&self) -> DiscardStrategy {
        DiscardStrategy::Lru
    }

    fn spot_kind(&self) -> SpotKind {
        SpotKind::Timeline
    }

    fn deform(&self, _key: &str, meta: &SpotMeta) -> SpotMeta {
        // born is drawn from the same sequence as access stamps
        meta.reshaped(SpotKind::Timeline, meta.born())
    }

    fn ascend(&self, meta: &SpotMeta, stamp: AccessStamp) {
        meta.touch(stamp.at_millis);
        meta.raise_rank(stamp.seq);
    }

    fn discard(&self, map: &dyn RankedMap, percent: f32, _now: u64) -> usize {
        discard_lowest_ranked(map, victim_count(map.len(), percent))
    }
}

/// LFU: hit count ranking
#[derive(Debug, Default, Clone, Copy)]
pub struct HotDiscard;

impl Discard for HotDiscard {
    fn strategy(&self) -> DiscardStrategy {
        DiscardStrategy::Lfu
    }

    fn spot_kind(&self) -> SpotKind {
        SpotKind::Hot
    }

    fn deform(&self, _key: &str, meta: &SpotMeta) -> SpotMeta {
        meta.reshaped(SpotKind::Hot, 0)
    }

    fn ascend(&self, meta: &SpotMeta, stamp: AccessStamp) {
        meta.touch(stamp.at_millis);
        meta.bump_rank();
    }

    fn discard(&self, map: &dyn RankedMap, percent: f32, _now: u64) -> usize {
        discard_lowest_ranked(map, victim_count(map.len(), percent))
    }
}

/// Time based expiry without ranking
#[derive(Debug, Default, Clone, Copy)]
pub struct LazyExpireDiscard;

impl Discard for LazyExpireDiscard {
    fn strategy(&self) -> DiscardStrategy {
        DiscardStrategy::LazyExpire
    }

    fn spot_kind(&self) -> SpotKind {
        SpotKind::Expire
    }

    fn deform(&self, _key: &str, meta: &SpotMeta) -> SpotMeta {
        meta.reshaped(SpotKind::Expire, 0)
    }

    fn ascend(&self, _meta: &SpotMeta, _stamp: AccessStamp) {}

    fn discard(&self, map: &dyn RankedMap, percent: f32, now: u64) -> usize {
        let mut candidates = map.candidates();
        let expired: Vec<&Candidate> = candidates.iter().filter(|c| c.is_expired(now)).collect();
        if !expired.is_empty() {
            return expired.into_iter().filter(|c| map.evict(c)).count();
        }

        let count = victim_count(candidates.len(), percent);
        candidates.sort_by_key(|c| c.born);
        candidates.iter().take(count).filter(|c| map.evict(c)).count()
    }
}

static TIMELINE: TimelineDiscard = TimelineDiscard;
static HOT: HotDiscard = HotDiscard;
static LAZY_EXPIRE: LazyExpireDiscard = LazyExpireDiscard;

/// Strategy implementation for a tag
pub fn discard_for(strategy: DiscardStrategy) -> &'static dyn Discard {
    match strategy {
        DiscardStrategy::Lru => &TIMELINE,
        DiscardStrategy::Lfu => &HOT,
        DiscardStrategy::LazyExpire => &LAZY_EXPIRE,
    }
}
