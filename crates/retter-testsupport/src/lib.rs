//! A controllable dummy HTTP origin for exercising `retter` end to end.
//!
//! Grounded on the original system's `test/DummyHttpServer.go`: every
//! request other than `/set` and `/health` sleeps a random duration in
//! `[fastest, slowest]` and then, with probability `fail_probability`,
//! answers 500 instead of 200. `/set?f=<secs>&s=<secs>&e=<rate>`
//! reconfigures those knobs at runtime so a test can flip the origin from
//! healthy to failing mid-run; `/health` always answers fast regardless of
//! the configured fault injection, so a test can tell a dead dummy origin
//! apart from one that is failing on purpose.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use rand::Rng;
use serde::Deserialize;

struct Inner {
    fastest: AtomicU64,
    slowest: AtomicU64,
    fail_probability_bits: AtomicU64,
    request_count: AtomicU64,
}

/// A cloneable handle to a dummy origin's runtime-adjustable fault
/// injection knobs.
#[derive(Clone)]
pub struct DummyOrigin {
    inner: Arc<Inner>,
}

impl DummyOrigin {
    /// Builds a dummy origin that always answers immediately with 200 until
    /// reconfigured, matching the defaults used by the original test
    /// harness (`fastest=0`, `slowest=1s`, `fail_probability=0`).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                fastest: AtomicU64::new(0),
                slowest: AtomicU64::new(1_000),
                fail_probability_bits: AtomicU64::new(0f64.to_bits()),
                request_count: AtomicU64::new(0),
            }),
        }
    }

    /// Reconfigures the simulated latency window and failure rate. Mirrors
    /// the swap-if-inverted guard in `SetFastest`: a caller that passes
    /// `fastest > slowest` gets the two swapped rather than a panic.
    pub fn configure(&self, fastest: Duration, slowest: Duration, fail_probability: f64) {
        let (fastest, slowest) = if fastest > slowest {
            (slowest, fastest)
        } else {
            (fastest, slowest)
        };
        self.inner
            .fastest
            .store(fastest.as_millis() as u64, Ordering::Relaxed);
        self.inner
            .slowest
            .store(slowest.as_millis() as u64, Ordering::Relaxed);
        self.inner
            .fail_probability_bits
            .store(fail_probability.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Convenience for the common test case: always fail, no delay.
    pub fn always_fail(&self) {
        self.configure(Duration::ZERO, Duration::ZERO, 1.0);
    }

    /// Convenience for the common test case: always succeed, no delay.
    pub fn always_succeed(&self) {
        self.configure(Duration::ZERO, Duration::ZERO, 0.0);
    }

    fn fastest(&self) -> Duration {
        Duration::from_millis(self.inner.fastest.load(Ordering::Relaxed))
    }

    fn slowest(&self) -> Duration {
        Duration::from_millis(self.inner.slowest.load(Ordering::Relaxed))
    }

    fn fail_probability(&self) -> f64 {
        f64::from_bits(self.inner.fail_probability_bits.load(Ordering::Relaxed))
    }

    fn next_request_id(&self) -> u64 {
        self.inner.request_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The axum router implementing the dummy origin's HTTP surface.
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", any(health))
            .route("/set", any(reconfigure))
            .fallback(any(serve))
            .with_state(self)
    }
}

impl Default for DummyOrigin {
    fn default() -> Self {
        Self::new()
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
struct ReconfigureParams {
    f: Option<u64>,
    s: Option<u64>,
    e: Option<f64>,
}

async fn reconfigure(
    State(origin): State<DummyOrigin>,
    Query(params): Query<ReconfigureParams>,
) -> impl IntoResponse {
    let id = origin.next_request_id();
    let fastest = params
        .f
        .map(Duration::from_secs)
        .unwrap_or_else(|| origin.fastest());
    let slowest = params
        .s
        .map(Duration::from_secs)
        .unwrap_or_else(|| origin.slowest());
    let fail_probability = params.e.unwrap_or_else(|| origin.fail_probability());
    origin.configure(fastest, slowest, fail_probability);
    (StatusCode::OK, format!("DONE {id}"))
}

async fn serve(State(origin): State<DummyOrigin>) -> impl IntoResponse {
    let id = origin.next_request_id();
    let fastest = origin.fastest();
    let slowest = origin.slowest();
    let span = slowest.saturating_sub(fastest);
    let sleep = if span.is_zero() {
        fastest
    } else {
        fastest + Duration::from_nanos(rand::thread_rng().gen_range(0..span.as_nanos() as u64))
    };
    tokio::time::sleep(sleep).await;

    if rand::thread_rng().gen::<f64>() < origin.fail_probability() {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("ERROR {id}"))
    } else {
        (StatusCode::OK, format!("DONE {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_ignores_fault_injection() {
        let origin = DummyOrigin::new();
        origin.always_fail();
        let response = origin
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn always_fail_returns_500() {
        let origin = DummyOrigin::new();
        origin.always_fail();
        let response = origin
            .router()
            .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn always_succeed_returns_200() {
        let origin = DummyOrigin::new();
        origin.always_succeed();
        let response = origin
            .router()
            .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn set_endpoint_reconfigures_at_runtime() {
        let origin = DummyOrigin::new();
        let response = origin
            .clone()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/set?f=0&s=0&e=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(origin.fail_probability(), 1.0);
    }
}
