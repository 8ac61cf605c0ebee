//! # Lumen Core
//!
//! Cache engine and request limiters - no infrastructure dependencies.
//!
//! This crate contains:
//! - [`light`]: the two-tier cache engine with pluggable discard strategies
//! - [`particle`]: idempotent, times and barrier limiters built on the engine
//!
//! ## Architecture Principles
//! - Only depends on `lumen-common` and `lumen-domain`
//! - L2 backends are reached through the [`light::L2Store`] port
//! - Caller closures never run under a map lock

pub mod light;
pub mod particle;

pub use light::{
    CacheError, CacheRegistry, CacheStats, CacheableOptions, KeyGenerator, L2Store, LightCache,
    LightError,
};
pub use particle::{
    BarrierLimiter, Guarded, IdempotentLimiter, LimitError, Limiter, LimiterExt, LimiterRegistry,
    Particle, TimesLimiter,
};
