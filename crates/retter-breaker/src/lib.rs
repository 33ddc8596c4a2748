//! A rolling-window circuit breaker, one instance per route key.
//!
//! The state machine's shape (closed/open/half-open, an atomic mirror of
//! the state for lock-free reads, a `transition_to` that resets all
//! counts) follows this workspace's generic circuit breaker crate. Its
//! tripping semantics are its own: a rolling wall-clock window plus a
//! consecutive-failure ceiling, matching a `sony/gobreaker`-style breaker
//! rather than a fixed-size sliding window of calls.

pub mod breaker;
pub mod config;
pub mod error;
pub mod set;

pub use breaker::{Breaker, BreakerState};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::BreakerError;
pub use set::BreakerSet;
