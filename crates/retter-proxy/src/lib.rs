//! The failure-priority dispatcher: the glue that turns
//! `retter-core`'s cache/last-known/config/metrics and `retter-breaker`'s
//! per-key breaker into one request-handling policy, served over axum.
//!
//! Grounded on the original system's `Server.go` `ServeHTTP`, restructured
//! around an explicit [`Proxy`] value rather than process-wide globals, so
//! tests build a fresh `Proxy` instead of calling a shared `Clear()`.

pub mod error;
pub mod executor;
pub mod headers;
pub mod health;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use http::header::COOKIE;
use http::{HeaderMap, Method, Request, StatusCode};

use retter_breaker::{Breaker, BreakerConfig, BreakerSet, BreakerState};
use retter_core::{derive_key, Config, LastKnownSuccessStore, Metrics, Transaction, TtlCache};

use crate::executor::{Executor, UpstreamOutcome};
use crate::headers::{overlay, Source};

/// Owns every piece of per-process state the dispatcher needs: the TTL
/// cache, the last-known-success store, the breaker set, the upstream
/// executor, and the request-time counters. Constructed once at startup
/// and shared into the axum `Router` behind an `Arc`.
pub struct Proxy {
    config: Config,
    cache: TtlCache<Arc<Transaction>>,
    last_known: LastKnownSuccessStore,
    breakers: BreakerSet,
    executor: Executor,
    metrics: Metrics,
}

impl Proxy {
    /// Builds a `Proxy` from a resolved configuration view.
    pub fn new(config: Config) -> Self {
        let breaker_config = BreakerConfig::builder()
            .fail_rate_threshold(config.get_float("breaker.fail.rate"))
            .consecutive_fail_threshold(config.get_int("breaker.consecutive.fail").max(0) as u32)
            .window_interval(config.get_duration_secs("breaker.window.interval"))
            .open_timeout(config.get_duration_secs("breaker.open.timeout"))
            .build();
        let executor = Executor::new(config.get_string("backend.baseurl"));
        Self {
            cache: TtlCache::new(),
            last_known: LastKnownSuccessStore::new(),
            breakers: BreakerSet::new(breaker_config),
            executor,
            metrics: Metrics::new(),
            config,
        }
    }

    /// Builds the axum router: `/health` plus a catch-all that runs every
    /// other path through [`Proxy::dispatch`].
    pub fn into_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health::handler))
            .fallback(any(serve))
            .with_state(self)
    }

    /// Cancels every pending TTL-cache expiry task. Called during graceful
    /// shutdown so the process can exit without waiting out live TTLs.
    pub fn shutdown(&self) {
        self.cache.clear();
    }

    async fn dispatch(&self, req: Request<Body>) -> Response {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let headers = req.headers().clone();
        let path = uri.path().to_string();
        let raw_query = uri.query().map(str::to_string);

        let body = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
            Ok(body) => body,
            Err(e) => return internal_error(error::DispatchError::BodyRead(e.to_string())),
        };

        if method != Method::GET {
            return self
                .dispatch_non_get(method, &path, raw_query.as_deref(), &headers, body)
                .await;
        }
        self.dispatch_get(method, &path, raw_query.as_deref(), &headers, body)
            .await
    }

    /// Step 2: non-idempotent requests bypass the breaker and cache
    /// entirely and are forwarded verbatim.
    async fn dispatch_non_get(
        &self,
        method: Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let outcome = self
            .executor
            .execute(method, path, raw_query, headers, body)
            .await;
        build_response(outcome.status(), outcome.headers(), outcome.body())
    }

    /// Step 3: the breaker-gated, cache-memoised GET path.
    async fn dispatch_get(
        &self,
        method: Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let cookie_header = headers.get(COOKIE).and_then(|v| v.to_str().ok());
        let key = derive_key(
            path,
            raw_query,
            cookie_header,
            self.config.get_bool("cache.detect.query"),
            self.config.get_bool("cache.detect.session"),
        );

        let breaker = self.breakers.get_or_create(&key);
        let state_at_call_start = breaker.state();

        if state_at_call_start == BreakerState::Open {
            return self.serve_failure(&key, &breaker, 502).await;
        }

        let began_at = Instant::now();
        let method_for_tx = method.clone();
        let path_owned = path.to_string();
        let raw_query_owned = raw_query.map(str::to_string);
        let headers_owned = headers.clone();

        let result = breaker
            .call(
                async {
                    let outcome = self
                        .executor
                        .execute(method, path, raw_query, headers, body)
                        .await;
                    Ok::<UpstreamOutcome, Infallible>(outcome)
                },
                |outcome: &Result<UpstreamOutcome, Infallible>| {
                    outcome.as_ref().expect("executor never fails").is_failure()
                },
            )
            .await;

        match result {
            Err(retter_breaker::BreakerError::Open) => self.serve_failure(&key, &breaker, 502).await,
            Err(retter_breaker::BreakerError::Inner(infallible)) => match infallible {},
            Ok(outcome) if outcome.is_failure() => {
                self.serve_failure(&key, &breaker, outcome.status()).await
            }
            Ok(outcome) => {
                let ended_at = Instant::now();
                let status = outcome.status();
                let response_headers = outcome.headers();
                let body = outcome.body();

                let tx = Arc::new(Transaction {
                    began_at,
                    ended_at,
                    request_method: method_for_tx,
                    request_path: path_owned,
                    request_raw_query: raw_query_owned,
                    request_headers: headers_owned,
                    status,
                    response_headers: response_headers.clone(),
                    body: body.clone(),
                });
                self.cache.store(
                    key.clone(),
                    Arc::clone(&tx),
                    self.config.get_duration_secs("cache.ttl"),
                );
                self.last_known.store(key, tx);

                let mut headers = response_headers;
                overlay(&mut headers, state_at_call_start, Source::Backend);
                build_response(status, headers, body)
            }
        }
    }

    /// Step 3d: the fallback chain once the upstream call has failed (or
    /// was short-circuited by an open breaker) — cache, then
    /// last-known-success, then a synthetic error.
    async fn serve_failure(&self, key: &str, breaker: &Breaker, status_if_none: u16) -> Response {
        let current_state = breaker.state();

        if let Some(tx) = self
            .cache
            .get(key, false, self.config.get_duration_secs("cache.ttl"))
        {
            let mut headers = tx.response_headers.clone();
            overlay(&mut headers, current_state, Source::Cache);
            return build_response(tx.status, headers, tx.body.clone());
        }

        if let Some(tx) = self.last_known.get(key) {
            let mut headers = tx.response_headers.clone();
            overlay(&mut headers, current_state, Source::LastKnownSuccess);
            return build_response(tx.status, headers, tx.body.clone());
        }

        let mut headers = HeaderMap::new();
        overlay(&mut headers, current_state, Source::NoCache);
        build_response(
            status_if_none,
            headers,
            Bytes::from_static(b"Backend is down, please try again in few minutes"),
        )
    }
}

/// Builds the final client-facing response. `status` may carry the
/// synthetic `1000` timeout sentinel (see `retter_core::
/// STATUS_UPSTREAM_UNREACHABLE`), which `http::StatusCode` cannot
/// represent on the wire; such values fall back to 502, matching the
/// status already used elsewhere on this failure path.
fn build_response(status: u16, headers: HeaderMap, body: Bytes) -> Response {
    let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::builder()
        .status(status_code)
        .body(Body::from(body))
        .expect("status and body are always valid for a freshly built response");
    *response.headers_mut() = headers;
    response
}

fn internal_error(e: error::DispatchError) -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::from(e.to_string()))
        .expect("status and body are always valid for a freshly built response")
}

async fn serve(State(proxy): State<Arc<Proxy>>, req: Request<Body>) -> Response {
    let began = Instant::now();
    let response = proxy.dispatch(req).await;
    proxy.metrics.record(began.elapsed());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{HeaderName, HeaderValue};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    static X_CIRCUIT: HeaderName = HeaderName::from_static("x-circuit");
    static X_RETTER: HeaderName = HeaderName::from_static("x-retter");

    fn proxy_for(base_url: String) -> Arc<Proxy> {
        let mut config = Config::defaults();
        config.set("backend.baseurl", base_url);
        config.set("cache.ttl", "60");
        Arc::new(Proxy::new(config))
    }

    async fn get(router: &Router, uri: &str) -> Response {
        router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn s1_baseline_success_serves_from_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/path"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let router = proxy_for(server.uri()).into_router();
        let response = get(&router, "/test/path").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(&X_RETTER).unwrap(), "backend");
        assert_eq!(response.headers().get(&X_CIRCUIT).unwrap(), "CLOSED");
    }

    #[tokio::test]
    async fn s2_degrades_to_cache_on_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/path"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/test/path"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = proxy_for(server.uri()).into_router();
        assert_eq!(get(&router, "/test/path").await.status(), StatusCode::OK);

        for _ in 0..3 {
            let response = get(&router, "/test/path").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers().get(&X_RETTER).unwrap(), "cache");
            assert_eq!(response.headers().get(&X_CIRCUIT).unwrap(), "CLOSED");
        }
    }

    #[tokio::test]
    async fn s3_breaker_opens_after_consecutive_failures_but_cache_still_serves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/path"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/test/path"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = proxy_for(server.uri()).into_router();
        assert_eq!(get(&router, "/test/path").await.status(), StatusCode::OK);

        // Default consecutive-failure threshold is 5 (trips on the 6th).
        for _ in 0..6 {
            get(&router, "/test/path").await;
        }

        let response = get(&router, "/test/path").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(&X_RETTER).unwrap(), "cache");
        assert_eq!(response.headers().get(&X_CIRCUIT).unwrap(), "OPEN");
    }

    #[tokio::test]
    async fn s4_no_cache_no_last_known_returns_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test/newpath"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = proxy_for(server.uri()).into_router();
        let response = get(&router, "/test/newpath").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get(&X_RETTER).unwrap(), "no-cache");
        assert_eq!(response.headers().get(&X_CIRCUIT).unwrap(), "CLOSED");
    }

    #[tokio::test]
    async fn s5_health_reports_expected_fields() {
        let server = MockServer::start().await;
        let router = proxy_for(server.uri()).into_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        for field in [
            "status",
            "server-uptime",
            "cache-count",
            "ttl-timer-count",
            "breaker-count",
            "total-request-served",
            "total-response-time-ms",
            "average-response-time-ms",
            "slowest-response-time-ms",
            "fastest-response-time-ms",
            "memory",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[tokio::test]
    async fn s6_non_get_bypasses_breaker_and_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let proxy = proxy_for(server.uri());
        let router = Arc::clone(&proxy).into_router();

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(&X_RETTER).is_none());
        assert_eq!(proxy.breakers.len(), 0);
        assert_eq!(proxy.cache.len(), 0);
    }

    #[tokio::test]
    async fn diagnostic_headers_are_never_duplicated_on_cache_reuse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dup"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-circuit", "stale")
                    .insert_header("x-retter", "stale"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dup"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let router = proxy_for(server.uri()).into_router();
        get(&router, "/dup").await;
        let response = get(&router, "/dup").await;

        assert_eq!(response.headers().get_all(&X_CIRCUIT).iter().count(), 1);
        assert_eq!(response.headers().get_all(&X_RETTER).iter().count(), 1);
        assert_eq!(
            response.headers().get(&X_RETTER).unwrap(),
            HeaderValue::from_static("cache")
        );
    }
}
