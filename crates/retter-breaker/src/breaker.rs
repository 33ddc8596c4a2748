//! Per-key breaker state machine.
//!
//! Grounded on `Breaker.go`, which wraps `github.com/sony/gobreaker` with a
//! `ReadyToTrip` rule of "consecutive failures > 5" and an otherwise
//! default, unconfigured `Settings{}` (zero `Interval`, zero `Timeout`).
//! gobreaker itself additionally trips on a failure-rate-over-a-rolling-
//! window condition whenever `Interval` is nonzero; this implementation
//! exposes both conditions as configuration (`breaker.fail.rate`,
//! `breaker.consecutive.fail`, `breaker.window.interval`,
//! `breaker.open.timeout`) rather than hard-coding gobreaker's zero
//! values, while keeping their defaults equivalent.
//!
//! The state-mirroring-in-an-atomic idiom (lock-free `state()` reads
//! alongside a mutex-guarded mutable interior) follows
//! `tower-resilience-circuitbreaker`'s `Circuit`.

#[cfg(feature = "metrics")]
use metrics::counter;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::BreakerConfig;
use crate::error::BreakerError;

/// The three states a breaker can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl BreakerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Textual form used in the `X-Circuit` response header.
    pub fn as_header_value(self) -> &'static str {
        match self {
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF-OPEN",
            BreakerState::Closed => "CLOSED",
        }
    }
}

#[derive(Default)]
struct Counts {
    successes: u32,
    failures: u32,
    consecutive_successes: u32,
    consecutive_failures: u32,
}

impl Counts {
    fn completed(&self) -> u32 {
        self.successes + self.failures
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

struct Inner {
    state: BreakerState,
    counts: Counts,
    generation_started_at: Instant,
    last_state_change: Instant,
    half_open_probe_in_flight: bool,
}

/// A single key's breaker.
///
/// Reading [`Breaker::state`] never blocks on the same lock that guards
/// call bookkeeping, so a diagnostic header can cheaply sample state on
/// every response.
pub struct Breaker {
    name: String,
    config: BreakerConfig,
    state_atomic: Arc<AtomicU8>,
    inner: Mutex<Inner>,
}

impl Breaker {
    pub(crate) fn new(name: String, config: BreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            name,
            config,
            state_atomic: Arc::new(AtomicU8::new(BreakerState::Closed as u8)),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                counts: Counts::default(),
                generation_started_at: now,
                last_state_change: now,
                half_open_probe_in_flight: false,
            }),
        }
    }

    /// Lock-free read of the current state.
    pub fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Runs `future` if the breaker currently admits a call, classifying
    /// its outcome with `classify` and folding the result into the
    /// breaker's counts.
    ///
    /// `classify` receives the future's `Result` and returns `true` if it
    /// should count as a breaker failure — for an HTTP call this is
    /// "status >= 500 or transport error", not merely "the future
    /// resolved to `Err`".
    pub async fn call<Fut, T, E>(
        &self,
        future: Fut,
        classify: impl FnOnce(&Result<T, E>) -> bool,
    ) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }
        let outcome = future.await;
        let is_failure = classify(&outcome);
        self.record(is_failure);
        outcome.map_err(BreakerError::Inner)
    }

    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                self.maybe_roll_window(&mut inner);
                true
            }
            BreakerState::Open => {
                if inner.last_state_change.elapsed() >= self.config.open_timeout {
                    self.transition_to(&mut inner, BreakerState::HalfOpen);
                    inner.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    false
                } else {
                    inner.half_open_probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn record(&self, is_failure: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.half_open_probe_in_flight = false;

        if is_failure {
            inner.counts.failures += 1;
            inner.counts.consecutive_failures += 1;
            inner.counts.consecutive_successes = 0;
        } else {
            inner.counts.successes += 1;
            inner.counts.consecutive_successes += 1;
            inner.counts.consecutive_failures = 0;
        }

        #[cfg(feature = "metrics")]
        counter!(
            "retter_breaker_calls_total",
            "breaker" => self.name.clone(),
            "outcome" => if is_failure { "failure" } else { "success" },
        )
        .increment(1);

        match inner.state {
            BreakerState::HalfOpen => {
                if is_failure {
                    self.transition_to(&mut inner, BreakerState::Open);
                } else {
                    self.transition_to(&mut inner, BreakerState::Closed);
                }
            }
            BreakerState::Closed => {
                if self.should_trip(&inner.counts) {
                    self.transition_to(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::Open => {
                // Calls are short-circuited in Open; nothing reaches `record`.
            }
        }
    }

    fn should_trip(&self, counts: &Counts) -> bool {
        if counts.consecutive_failures > self.config.consecutive_fail_threshold {
            return true;
        }
        let completed = counts.completed();
        if completed > self.config.minimum_calls_in_window {
            let rate = f64::from(counts.failures) / f64::from(completed);
            if rate > self.config.fail_rate_threshold {
                return true;
            }
        }
        false
    }

    fn maybe_roll_window(&self, inner: &mut Inner) {
        if inner.generation_started_at.elapsed() >= self.config.window_interval {
            inner.counts.clear();
            inner.generation_started_at = Instant::now();
        }
    }

    fn transition_to(&self, inner: &mut Inner, state: BreakerState) {
        if inner.state == state {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, from = ?inner.state, to = ?state, "breaker state transition");

        #[cfg(feature = "metrics")]
        counter!(
            "retter_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => state.as_header_value(),
        )
        .increment(1);

        inner.state = state;
        inner.counts.clear();
        inner.generation_started_at = Instant::now();
        inner.last_state_change = Instant::now();
        if state != BreakerState::HalfOpen {
            inner.half_open_probe_in_flight = false;
        }
        self.state_atomic.store(state as u8, Ordering::Release);
    }
}
