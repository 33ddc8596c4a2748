//! The request/response record shared across the cache, last-known-success
//! store, and diagnostic headers.
//!
//! Grounded on `Transaction.go`, which bundles the inbound request and the
//! outbound response (or synthetic failure) the proxy produced for it.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

/// A synthetic status used when the origin could not be reached at all.
/// `http::StatusCode` tops out at 999, so this lives as a plain constant
/// rather than a `StatusCode` value; see [`Transaction::status_code`].
pub const STATUS_UPSTREAM_UNREACHABLE: u16 = 1000;

/// One completed attempt at serving a request, successful or not.
///
/// `status` is stored as a bare `u16` rather than `http::StatusCode` so that
/// [`STATUS_UPSTREAM_UNREACHABLE`] can be represented uniformly alongside
/// genuine origin status codes.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub began_at: Instant,
    pub ended_at: Instant,
    pub request_method: Method,
    pub request_path: String,
    pub request_raw_query: Option<String>,
    pub request_headers: HeaderMap,
    pub status: u16,
    pub response_headers: HeaderMap,
    pub body: Bytes,
}

impl Transaction {
    /// Wall-clock time the origin (or the fallback chain) took to produce
    /// this transaction's response.
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.began_at)
    }

    /// `true` for any response in the 1xx-4xx range; 5xx and the synthetic
    /// unreachable status count as failures, matching the origin's own
    /// partitioning of retryable/cacheable outcomes.
    pub fn is_success(&self) -> bool {
        self.status < 500
    }

    /// The status as a typed `StatusCode`, or `None` for the synthetic
    /// unreachable status (or any other value outside the valid HTTP range).
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }
}
