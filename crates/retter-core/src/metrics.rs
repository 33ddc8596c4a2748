//! Process-wide request counters backing the `/health` endpoint.
//!
//! Grounded on the original system's in-memory counters (total requests,
//! cumulative and extreme response times). The original keeps these in a
//! narrow integer that can wrap under sustained load; this port widens every
//! counter to `u64` rather than reproduce that overflow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Sentinel meaning "no request has been recorded yet" for the fastest-seen
/// counter, which otherwise tracks a running minimum.
const NO_SAMPLE: u64 = u64::MAX;

/// Lock-free counters, safe to share behind an `Arc` and update from many
/// concurrent request handlers.
pub struct Metrics {
    started_at: Instant,
    total_requests: AtomicU64,
    total_response_time_ms: AtomicU64,
    slowest_ms: AtomicU64,
    fastest_ms: AtomicU64,
}

/// A point-in-time read of [`Metrics`], suitable for serialising into the
/// `/health` response.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub total_requests: u64,
    pub total_response_time_ms: u64,
    pub average_response_time_ms: f64,
    pub slowest_ms: u64,
    pub fastest_ms: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            total_response_time_ms: AtomicU64::new(0),
            slowest_ms: AtomicU64::new(0),
            fastest_ms: AtomicU64::new(NO_SAMPLE),
        }
    }

    /// Folds one completed request's duration into the running counters.
    pub fn record(&self, duration: Duration) {
        let ms = duration.as_millis().min(u128::from(u64::MAX)) as u64;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_ms.fetch_add(ms, Ordering::Relaxed);
        self.slowest_ms.fetch_max(ms, Ordering::Relaxed);
        self.fastest_ms.fetch_min(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time_ms = self.total_response_time_ms.load(Ordering::Relaxed);
        let fastest_raw = self.fastest_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            total_requests,
            total_response_time_ms,
            average_response_time_ms: if total_requests == 0 {
                0.0
            } else {
                total_response_time_ms as f64 / total_requests as f64
            },
            slowest_ms: self.slowest_ms.load(Ordering::Relaxed),
            fastest_ms: if fastest_raw == NO_SAMPLE { 0 } else { fastest_raw },
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_before_any_request_is_all_zero() {
        let metrics = Metrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.slowest_ms, 0);
        assert_eq!(snap.fastest_ms, 0);
        assert_eq!(snap.average_response_time_ms, 0.0);
    }

    #[test]
    fn records_accumulate_and_track_extremes() {
        let metrics = Metrics::new();
        metrics.record(Duration::from_millis(50));
        metrics.record(Duration::from_millis(10));
        metrics.record(Duration::from_millis(200));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.total_response_time_ms, 260);
        assert_eq!(snap.slowest_ms, 200);
        assert_eq!(snap.fastest_ms, 10);
        assert!((snap.average_response_time_ms - 86.666).abs() < 0.01);
    }
}
