//! Foundation utilities shared across Lumen crates.
//!
//! - [`error`]: `CommonError`, `ErrorClassification`, `ErrorSeverity`
//! - [`time`]: the `Clock` abstraction with `SystemClock` and `MockClock`

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod time;

// Re-export commonly used types and traits for convenience
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
pub use time::{Clock, MockClock, SystemClock};
