//! Request limiters
//!
//! Limiters keep their counters and markers in [`LightCache`] instances and
//! report each decision as a [`Particle`].
//!
//! - [`IdempotentLimiter`]: one admitted call per identifier and window
//! - [`TimesLimiter`]: a ceiling of calls per identifier and window
//! - [`BarrierLimiter`]: an ordered chain that stops at the first limit
//!
//! # Examples
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! use lumen_core::particle::{LimiterExt, LimiterRegistry};
//! use lumen_domain::{LimiterSpec, ParticleSettings};
//!
//! let settings = ParticleSettings {
//!     limiters: vec![LimiterSpec::idempotent("idempotentLimiter", 60)],
//!     ..ParticleSettings::default()
//! };
//! let limiters = LimiterRegistry::from_settings(&settings).unwrap();
//! let idempotent = limiters.get("idempotentLimiter").unwrap();
//!
//! let reply = |p: &lumen_core::particle::Particle| {
//!     Ok::<_, Infallible>(if p.limited { "duplicate" } else { "ok" })
//! };
//! assert_eq!(idempotent.limit("token-1", Duration::from_secs(60), reply).unwrap(), "ok");
//! assert_eq!(idempotent.limit("token-1", Duration::from_secs(60), reply).unwrap(), "duplicate");
//! ```
//!
//! [`LightCache`]: crate::light::LightCache

pub mod barrier;
pub mod idempotent;
pub mod limiter;
#[allow(clippy::module_inception)]
pub mod particle;
pub mod registry;
pub mod times;

pub use barrier::BarrierLimiter;
pub use idempotent::IdempotentLimiter;
pub use limiter::{Guarded, LimitError, Limiter, LimiterExt};
pub use particle::Particle;
pub use registry::LimiterRegistry;
pub use times::TimesLimiter;
