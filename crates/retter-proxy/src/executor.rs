//! Upstream HTTP execution.
//!
//! Grounded on the request-building and forwarding half of `Server.go`: a
//! single shared HTTP client, a 15-second deadline per call, and three
//! possible outcomes (a real response, a timeout, or some other transport
//! failure). The executor never retries or interprets a response — that is
//! the breaker's and the dispatcher's job.

use std::time::Duration;

use bytes::Bytes;
use http::header::ACCEPT_ENCODING;
use http::{HeaderMap, Method};
use reqwest::Client;

use retter_core::STATUS_UPSTREAM_UNREACHABLE;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// What came back from one attempt to reach the origin.
///
/// `http::StatusCode` cannot hold the synthetic timeout status `1000`, so
/// the timeout case is its own variant rather than an out-of-range status
/// code; [`UpstreamOutcome::status`] is where `1000` is materialised as a
/// plain integer, only at the point something needs to read or log it.
#[derive(Debug, Clone)]
pub enum UpstreamOutcome {
    Response {
        status: u16,
        headers: HeaderMap,
        body: Bytes,
    },
    Timeout,
    TransportError(String),
}

impl UpstreamOutcome {
    pub fn status(&self) -> u16 {
        match self {
            UpstreamOutcome::Response { status, .. } => *status,
            UpstreamOutcome::Timeout => STATUS_UPSTREAM_UNREACHABLE,
            UpstreamOutcome::TransportError(_) => 502,
        }
    }

    pub fn headers(&self) -> HeaderMap {
        match self {
            UpstreamOutcome::Response { headers, .. } => headers.clone(),
            _ => HeaderMap::new(),
        }
    }

    pub fn body(&self) -> Bytes {
        match self {
            UpstreamOutcome::Response { body, .. } => body.clone(),
            UpstreamOutcome::Timeout => Bytes::from_static(b"Backend timed out"),
            UpstreamOutcome::TransportError(msg) => Bytes::from(msg.clone()),
        }
    }

    /// `true` when the breaker should count this attempt as a failure:
    /// any transport problem, or an HTTP 5xx from the origin itself.
    pub fn is_failure(&self) -> bool {
        self.status() >= 500
    }
}

/// Forwards requests to a single configured origin.
pub struct Executor {
    client: Client,
    base_url: String,
}

impl Executor {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .expect("reqwest client with only a fixed timeout is infallible to build");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    #[cfg(test)]
    fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Issues one forwarded request and reports how it went.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> UpstreamOutcome {
        let mut url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        let mut builder = self.client.request(method, &url);
        if let Some(out_headers) = builder.headers_mut() {
            for (name, value) in headers.iter() {
                if name == ACCEPT_ENCODING {
                    continue;
                }
                out_headers.append(name, value.clone());
            }
        }
        builder = builder.body(body);

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                match response.bytes().await {
                    Ok(body) => UpstreamOutcome::Response {
                        status,
                        headers,
                        body,
                    },
                    Err(e) => UpstreamOutcome::TransportError(e.to_string()),
                }
            }
            Err(e) if e.is_timeout() => UpstreamOutcome::Timeout,
            Err(e) => UpstreamOutcome::TransportError(e.to_string()),
        }
    }
}
