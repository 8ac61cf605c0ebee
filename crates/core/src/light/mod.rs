//! Two-tier cache engine
//!
//! - [`spot`]: the per-key envelope and its atomic ranking metadata
//! - [`discard`]: LRU, LFU and LazyExpire discard strategies
//! - [`cache`]: the L1/L2 engine (`get`, `put`, `erase`, ...)
//! - [`store`]: the L2 port
//! - [`registry`]: named instances seeded from a template
//!
//! # Examples
//!
//! ```
//! use std::convert::Infallible;
//!
//! use lumen_core::light::{CacheRegistry, CacheableOptions};
//! use lumen_domain::LightSettings;
//!
//! let registry: CacheRegistry<String> = CacheRegistry::new(LightSettings::default()).unwrap();
//! let options = CacheableOptions::default();
//!
//! let order = registry
//!     .cacheable("orders", &options, "order:", "42", |_| Ok::<_, Infallible>("pending".to_string()))
//!     .unwrap();
//! assert_eq!(order, "pending");
//! ```

pub mod cache;
pub mod discard;
pub mod error;
pub mod keys;
pub mod registry;
pub mod spot;
pub mod stats;
pub mod store;

pub use cache::LightCache;
pub use discard::{
    discard_for, victim_count, Candidate, Discard, HotDiscard, LazyExpireDiscard, RankedMap,
    TimelineDiscard,
};
pub use error::{CacheError, LightError};
pub use keys::KeyGenerator;
pub use registry::{CacheRegistry, CacheableOptions};
pub use spot::{AccessStamp, Spot, SpotKind, SpotMeta};
pub use stats::CacheStats;
pub use store::L2Store;
