//! Per-call limiter verdict

use lumen_domain::LimiterKind;
use serde::{Deserialize, Serialize};

/// Verdict of one limiter evaluation
///
/// Only the counter or marker behind it is stored; the particle itself lives
/// for the duration of the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Particle {
    /// Whether the call is over the limit
    pub limited: bool,

    /// Counter after this call (times) or the stored marker (idempotent)
    pub value: u64,

    /// Policy of the limiter that produced the verdict
    pub kind: LimiterKind,

    /// Name of the limiter that produced the verdict
    pub limiter: String,
}

impl Particle {
    pub fn new(limited: bool, value: u64, kind: LimiterKind, limiter: impl Into<String>) -> Self {
        Self { limited, value, kind, limiter: limiter.into() }
    }

    pub fn is_limited(&self) -> bool {
        self.limited
    }

    /// Whether this particle is a limited verdict of a `kind` limiter
    pub fn fired_by(&self, kind: LimiterKind) -> bool {
        self.limited && self.kind == kind
    }
}
