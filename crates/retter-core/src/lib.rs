//! Shared building blocks for the `retter` reverse proxy: the configuration
//! view, route-key derivation, the request/response record, the TTL cache,
//! the last-known-success store, and the request counters behind `/health`.
//!
//! These pieces are deliberately infallible and synchronous at the API
//! surface — `retter-proxy` wires them into the async request pipeline and
//! `retter-breaker` supplies the circuit breaker that sits alongside them.

pub mod cache;
pub mod config;
pub mod key;
pub mod lastknown;
pub mod metrics;
pub mod transaction;

pub use cache::TtlCache;
pub use config::Config;
pub use key::derive_key;
pub use lastknown::LastKnownSuccessStore;
pub use metrics::{Metrics, MetricsSnapshot};
pub use transaction::{Transaction, STATUS_UPSTREAM_UNREACHABLE};
