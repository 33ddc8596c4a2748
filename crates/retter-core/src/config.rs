//! Read-only typed configuration view over a string table with env overlay.
//!
//! Mirrors the data model in the system's original configuration component: a
//! flat `option -> default string` table, overlaid by same-named environment
//! variables. A binary embedding this crate (see the `retter` bin) is free to
//! overlay a further layer (CLI flags) on top via [`Config::set`].

use std::collections::HashMap;
use std::time::Duration;

/// All recognised configuration keys, with their built-in defaults.
const DEFAULTS: &[(&str, &str)] = &[
    ("cache.ttl", "60"),
    ("cache.detect.query", "true"),
    ("cache.detect.session", "false"),
    ("backend.baseurl", "http://localhost:8088"),
    ("server.listen", ":8089"),
    ("server.timeout.write", "15"),
    ("server.timeout.read", "15"),
    ("server.timeout.idle", "60"),
    ("server.timeout.graceshut", "15"),
    ("breaker.fail.rate", "0.66"),
    ("breaker.consecutive.fail", "5"),
    ("breaker.window.interval", "10"),
    ("breaker.open.timeout", "0"),
    ("log.level", "info"),
];

/// A typed view over the proxy's configuration table.
///
/// Lookups fall back to the compiled-in default for any key that was never
/// overlaid, and never panic on a missing key — an unrecognised key simply
/// reads as an empty string / zero / false.
#[derive(Debug, Clone)]
pub struct Config {
    values: HashMap<&'static str, String>,
}

impl Config {
    /// Builds a `Config` holding only the built-in defaults.
    pub fn defaults() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect(),
        }
    }

    /// Builds a `Config` from defaults overlaid by `RETTER_<KEY>` environment
    /// variables (dots replaced with underscores, case-insensitive).
    pub fn from_env() -> Self {
        let mut cfg = Self::defaults();
        cfg.overlay_env();
        cfg
    }

    /// Re-reads environment variables and overlays any that are set atop the
    /// current values. Later callers (e.g. a CLI layer) can still override
    /// the result with [`Config::set`].
    pub fn overlay_env(&mut self) {
        for (key, _) in DEFAULTS {
            let env_name = format!("RETTER_{}", key.to_uppercase().replace('.', "_"));
            if let Ok(val) = std::env::var(&env_name) {
                self.values.insert(key, val);
            }
        }
    }

    /// Overrides a single key, e.g. from a parsed CLI flag.
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Raw string value for `key`, or the empty string if unrecognised.
    pub fn get_string(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }

    /// Parses `key` as an integer, warning and falling back to `0` on a
    /// malformed value (the original config component degrades the same way
    /// rather than treating a parse failure as fatal).
    pub fn get_int(&self, key: &str) -> i64 {
        let raw = self.get_string(key);
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "config value is not a valid integer; using 0");
            0
        })
    }

    /// Parses `key` as a float, warning and falling back to `0.0` on a
    /// malformed value.
    pub fn get_float(&self, key: &str) -> f64 {
        let raw = self.get_string(key);
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "config value is not a valid float; using 0.0");
            0.0
        })
    }

    /// Parses `key` as a boolean, warning and falling back to `false` on a
    /// malformed value.
    pub fn get_bool(&self, key: &str) -> bool {
        let raw = self.get_string(key);
        raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "config value is not a valid boolean; using false");
            false
        })
    }

    /// Parses `key` as a whole number of seconds.
    pub fn get_duration_secs(&self, key: &str) -> Duration {
        Duration::from_secs_f64(self.get_float(key).max(0.0))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::defaults();
        assert_eq!(cfg.get_int("cache.ttl"), 60);
        assert!(cfg.get_bool("cache.detect.query"));
        assert!(!cfg.get_bool("cache.detect.session"));
        assert_eq!(cfg.get_string("backend.baseurl"), "http://localhost:8088");
        assert_eq!(cfg.get_string("server.listen"), ":8089");
        assert_eq!(cfg.get_float("breaker.fail.rate"), 0.66);
        assert_eq!(cfg.get_int("breaker.consecutive.fail"), 5);
        assert_eq!(cfg.get_int("breaker.window.interval"), 10);
        assert_eq!(cfg.get_int("breaker.open.timeout"), 0);
    }

    #[test]
    fn explicit_set_overrides_default() {
        let mut cfg = Config::defaults();
        cfg.set("cache.ttl", "5");
        assert_eq!(cfg.get_int("cache.ttl"), 5);
    }

    #[test]
    fn env_overlay_wins_over_default() {
        // SAFETY: test-only env mutation, no other test reads this key concurrently.
        unsafe { std::env::set_var("RETTER_CACHE_TTL", "120") };
        let cfg = Config::from_env();
        assert_eq!(cfg.get_int("cache.ttl"), 120);
        unsafe { std::env::remove_var("RETTER_CACHE_TTL") };
    }

    #[test]
    fn malformed_value_falls_back_to_zero() {
        let mut cfg = Config::defaults();
        cfg.set("cache.ttl", "not-a-number");
        assert_eq!(cfg.get_int("cache.ttl"), 0);
    }
}
