//! Limiter contract
//!
//! A limiter only computes a verdict ([`Limiter::admit`]). Running the
//! guarded body is layered on top by [`LimiterExt`]:
//! - `limit` always runs the body and hands it the particle, the body
//!   branches on `particle.limited`
//! - `guard` runs the body only for an admitted call
//!
//! State written by `admit` is committed before the body runs and is never
//! rolled back when the body fails.

use std::fmt::Debug;
use std::time::Duration;

use lumen_domain::LimiterKind;
use thiserror::Error;

use super::particle::Particle;
use crate::light::CacheError;

/// Error of a limited call, generic over the body's error type
#[derive(Debug, Error)]
pub enum LimitError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Limiter state could not be read or written
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The guarded body failed
    #[error("Limited body failed")]
    BodyFailed {
        #[source]
        source: E,
    },
}

/// Outcome of [`LimiterExt::guard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<R> {
    /// The call was admitted and the action ran
    Admitted { particle: Particle, output: R },
    /// The call was limited; the action did not run
    Limited(Particle),
}

impl<R> Guarded<R> {
    pub fn particle(&self) -> &Particle {
        match self {
            Self::Admitted { particle, .. } | Self::Limited(particle) => particle,
        }
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited(_))
    }

    /// Action output when admitted
    pub fn output(self) -> Option<R> {
        match self {
            Self::Admitted { output, .. } => Some(output),
            Self::Limited(_) => None,
        }
    }
}

/// Admission-control policy
pub trait Limiter: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> LimiterKind;

    /// Record this call for `id` and return the verdict
    ///
    /// # Errors
    /// Returns `CacheError::MissingKey` for an empty `id`; nothing is
    /// recorded then.
    fn admit(&self, id: &str, expire: Duration) -> Result<Particle, CacheError>;

    /// Drop state whose window has closed; returns how many entries went
    ///
    /// Stateless limiters have nothing to sweep.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Body-running helpers for every limiter
pub trait LimiterExt: Limiter {
    /// Evaluate the limiter, then run `body` with the verdict
    ///
    /// # Errors
    /// `LimitError::Cache` when no verdict could be computed (the body does
    /// not run), `LimitError::BodyFailed` with the body's error.
    fn limit<F, R, E>(&self, id: &str, expire: Duration, body: F) -> Result<R, LimitError<E>>
    where
        F: FnOnce(&Particle) -> Result<R, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let particle = self.admit(id, expire)?;
        body(&particle).map_err(|source| LimitError::BodyFailed { source })
    }

    /// Evaluate the limiter and run `action` only if the call is admitted
    ///
    /// # Errors
    /// As [`LimiterExt::limit`].
    fn guard<F, R, E>(&self, id: &str, expire: Duration, action: F) -> Result<Guarded<R>, LimitError<E>>
    where
        F: FnOnce(&Particle) -> Result<R, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let particle = self.admit(id, expire)?;
        if particle.limited {
            return Ok(Guarded::Limited(particle));
        }
        let output = action(&particle).map_err(|source| LimitError::BodyFailed { source })?;
        Ok(Guarded::Admitted { particle, output })
    }
}

impl<L: Limiter + ?Sized> LimiterExt for L {}
