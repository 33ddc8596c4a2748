//! Route-key derivation.
//!
//! Grounded on `getKey()` in the original system's `cache/Caching.go` and the
//! request fields read off in `Transaction.go`: the cache/breaker/last-known
//! key is the request path, optionally suffixed with the verbatim raw query
//! string, optionally prefixed with a session-identifying cookie fragment
//! pulled out of the `Cookie` header by regex.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a session-identifying cookie assignment among others in a
/// `Cookie` header, e.g. `JSESSIONID=AB12CD34`.
static SESSION_COOKIE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(ci_session|JSESSIONID|PHPSESSID)\s*=\s*[A-Za-z0-9.\-]+")
        .expect("session cookie pattern is a fixed, valid regular expression")
});

/// Derives the route key used to index the cache, the last-known-success
/// store, and (by path alone — see module docs on `retter-breaker`) the
/// circuit breaker set.
///
/// - `detect_query` appends `?<raw_query>` verbatim when the request carried
///   one, so `/a?x=1` and `/a?x=2` key separately.
/// - `detect_session` prefixes the key with the first session cookie found
///   in `cookie_header`, so two sessions hitting the same path/query key
///   separately. A request without a recognised session cookie is keyed as
///   if `detect_session` were off.
pub fn derive_key(
    path: &str,
    raw_query: Option<&str>,
    cookie_header: Option<&str>,
    detect_query: bool,
    detect_session: bool,
) -> String {
    let mut key = path.to_string();

    if detect_query {
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            key.push('?');
            key.push_str(query);
        }
    }

    if detect_session {
        if let Some(found) = cookie_header.and_then(|header| SESSION_COOKIE.find(header)) {
            key = format!("{}:{}", found.as_str(), key);
        }
    }

    key
}
