//! In-process L2 store
//!
//! Keeps encoded values in a `DashMap` with an optional deadline per key.
//! Expired keys are dropped when read, the way a remote store would stop
//! returning them. The store can be switched off to exercise the engine's
//! outage handling.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lumen_common::error::{CommonError, CommonResult};
use lumen_common::time::{Clock, SystemClock};
use lumen_core::light::L2Store;
use tracing::trace;

const STORE_NAME: &str = "memory";

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    deadline: Option<u64>,
}

/// `DashMap`-backed [`L2Store`]
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: DashMap<String, Entry>,
    available: AtomicBool,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Shared handle ready for `LightCache::with_store`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { entries: DashMap::new(), available: AtomicBool::new(true), clock }
    }

    /// Switch the store on or off; while off every call fails with a
    /// retryable backend error
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of stored keys, expired ones included until touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining lifetime of `key`, `None` if absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.millis_since_epoch();
        let deadline = self.entries.get(key)?.deadline?;
        Some(Duration::from_millis(deadline.saturating_sub(now)))
    }

    fn ensure_available(&self) -> CommonResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CommonError::backend(STORE_NAME, "store unavailable", true))
        }
    }
}

impl<C: Clock> L2Store for MemoryStore<C> {
    fn name(&self) -> &str {
        STORE_NAME
    }

    fn read(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        self.ensure_available()?;
        let now = self.clock.millis_since_epoch();

        let expired = self.entries.remove_if(key, |_, entry| entry.deadline.is_some_and(|at| now >= at));
        if expired.is_some() {
            trace!(key = %key, "Expired key dropped on read");
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.bytes.clone()))
    }

    fn write(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CommonResult<()> {
        self.ensure_available()?;
        let deadline = ttl.map(|ttl| self.clock.millis_since_epoch().saturating_add(ttl.as_millis() as u64));
        self.entries.insert(key.to_string(), Entry { bytes: value.to_vec(), deadline });
        Ok(())
    }

    fn delete(&self, key: &str) -> CommonResult<()> {
        self.ensure_available()?;
        self.entries.remove(key);
        Ok(())
    }
}

impl<C: Clock> fmt::Debug for MemoryStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.entries.len())
            .field("available", &self.is_available())
            .finish()
    }
}
