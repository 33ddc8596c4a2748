//! Last-known-success store.
//!
//! Grounded on the original system's use of a second, expiry-free map to
//! remember the most recent successful response per route key, used as a
//! second-tier fallback when the cache has nothing and the origin is
//! unavailable or circuit-broken. Unlike [`crate::cache::TtlCache`] entries
//! here never expire on their own; they are only ever replaced by a newer
//! success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transaction::Transaction;

/// Holds the most recent successful [`Transaction`] seen for each route key.
#[derive(Clone, Default)]
pub struct LastKnownSuccessStore {
    inner: Arc<Mutex<HashMap<String, Arc<Transaction>>>>,
}

impl LastKnownSuccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers `tx` as the last known success for `key`. Callers are
    /// expected to only pass transactions for which
    /// [`Transaction::is_success`] is `true`.
    pub fn store(&self, key: impl Into<String>, tx: Arc<Transaction>) {
        self.inner.lock().unwrap().insert(key.into(), tx);
    }

    /// The last known success for `key`, if any has been recorded.
    pub fn get(&self, key: &str) -> Option<Arc<Transaction>> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    /// Number of route keys with a remembered success.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
