//! Diagnostic response headers.
//!
//! `X-Circuit` and `X-Retter` are set-only, never appended. Rather than
//! mutate a stored
//! [`retter_core::Transaction`]'s header map in place before each reuse —
//! which would race under concurrent serves of the same cached entry — the
//! two headers are computed fresh per request and merged into the
//! outgoing response only at write time.

use http::{HeaderMap, HeaderName, HeaderValue};

use retter_breaker::BreakerState;

pub static X_CIRCUIT: HeaderName = HeaderName::from_static("x-circuit");
pub static X_RETTER: HeaderName = HeaderName::from_static("x-retter");

/// Where a served response's body ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Backend,
    Cache,
    LastKnownSuccess,
    NoCache,
}

impl Source {
    pub fn as_header_value(self) -> &'static str {
        match self {
            Source::Backend => "backend",
            Source::Cache => "cache",
            Source::LastKnownSuccess => "last-known-success",
            Source::NoCache => "no-cache",
        }
    }
}

/// Removes every existing occurrence of `name`, then inserts exactly one
/// copy with `value`. Guarantees the "at most one value" invariant
/// regardless of what the map held coming in (including, in principle, a
/// same-named header the origin happened to send).
fn set_single(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    headers.remove(&name);
    headers.insert(name, value);
}

/// Stamps `headers` with the current diagnostic pair. `circuit` is
/// expected to come from [`BreakerState::as_header_value`].
pub fn overlay(headers: &mut HeaderMap, circuit: BreakerState, source: Source) {
    set_single(
        headers,
        X_CIRCUIT.clone(),
        HeaderValue::from_static(circuit.as_header_value()),
    );
    set_single(
        headers,
        X_RETTER.clone(),
        HeaderValue::from_static(source.as_header_value()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_rather_than_appends() {
        let mut headers = HeaderMap::new();
        headers.insert(X_CIRCUIT.clone(), HeaderValue::from_static("stale"));
        overlay(&mut headers, BreakerState::Open, Source::Cache);

        let values: Vec<_> = headers.get_all(&X_CIRCUIT).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "OPEN");
        assert_eq!(headers.get(&X_RETTER).unwrap(), "cache");
    }
}
