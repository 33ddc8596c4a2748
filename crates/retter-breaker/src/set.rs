//! Keyed collection of breakers.
//!
//! Grounded on `Breaker.go`'s `PathBreakers` map: one breaker per route
//! key, created lazily and retained for the life of the process. Eviction
//! is deliberately out of scope, matching the source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::breaker::Breaker;
use crate::config::BreakerConfig;

/// Lazily populates one [`Breaker`] per key, sharing a single
/// [`BreakerConfig`] across all of them.
pub struct BreakerSet {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<Breaker>>>,
}

impl BreakerSet {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for `key`, creating it with the set's shared
    /// configuration if this is the first time `key` has been seen.
    pub fn get_or_create(&self, key: &str) -> Arc<Breaker> {
        let mut breakers = self.breakers.lock().unwrap();
        if let Some(breaker) = breakers.get(key) {
            return Arc::clone(breaker);
        }
        let breaker = Arc::new(Breaker::new(key.to_string(), self.config.clone()));
        breakers.insert(key.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Number of distinct keys with a breaker allocated so far.
    pub fn len(&self) -> usize {
        self.breakers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
