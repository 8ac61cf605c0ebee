//! Domain constants
//!
//! Centralized defaults for cache instances and limiters.

// Cache instance naming
pub const DEFAULT_CACHE_NAME: &str = "lightCache";
pub const INNER_CACHE_PREFIX: &str = "lightCache_";

// Expiry sentinel: the tier never expires by time
pub const NEVER_EXPIRE: i64 = -1;

// Default template values
pub const DEFAULT_L1_MAX_COUNT: usize = 64;
pub const DEFAULT_L1_DISCARD_PERCENT: f32 = 0.1;
pub const DEFAULT_L1_EXPIRE_SECS: i64 = 60;

// Limiters
pub const PARTICLE_KEY_PREFIX: &str = "particle:";
pub const DEFAULT_LIMITER_EXPIRE_SECS: u64 = 60;
