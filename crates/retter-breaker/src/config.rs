use std::time::Duration;

/// Tuning knobs for a single breaker, shared by every key in a
/// [`crate::BreakerSet`].
///
/// Constructed via [`BreakerConfig::builder`], mirroring the builder
/// convention used throughout this family of resilience primitives.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub(crate) fail_rate_threshold: f64,
    pub(crate) consecutive_fail_threshold: u32,
    pub(crate) window_interval: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) minimum_calls_in_window: u32,
}

impl BreakerConfig {
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    fail_rate_threshold: f64,
    consecutive_fail_threshold: u32,
    window_interval: Duration,
    open_timeout: Duration,
    minimum_calls_in_window: u32,
}

impl BreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            fail_rate_threshold: 0.66,
            consecutive_fail_threshold: 5,
            window_interval: Duration::from_secs(10),
            open_timeout: Duration::ZERO,
            minimum_calls_in_window: 4,
        }
    }

    /// Failure rate (failures / completed calls) above which the breaker
    /// trips, once [`BreakerConfigBuilder::minimum_calls_in_window`] has
    /// been reached within the current rolling window.
    ///
    /// Default: 0.66
    pub fn fail_rate_threshold(mut self, rate: f64) -> Self {
        self.fail_rate_threshold = rate;
        self
    }

    /// Consecutive-failure count above which the breaker trips
    /// unconditionally, regardless of window occupancy.
    ///
    /// Default: 5
    pub fn consecutive_fail_threshold(mut self, n: u32) -> Self {
        self.consecutive_fail_threshold = n;
        self
    }

    /// Length of the rolling window before counts are cleared and the
    /// generation stamp advances, while the breaker stays Closed.
    ///
    /// Default: 10 seconds
    pub fn window_interval(mut self, interval: Duration) -> Self {
        self.window_interval = interval;
        self
    }

    /// How long the breaker stays Open before a probe call is admitted.
    /// Zero means the very next call after tripping is eligible.
    ///
    /// Default: 0 seconds
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Completed-call floor within the window before the failure-rate
    /// condition is even evaluated.
    ///
    /// Default: 4
    pub fn minimum_calls_in_window(mut self, n: u32) -> Self {
        self.minimum_calls_in_window = n;
        self
    }

    pub fn build(self) -> BreakerConfig {
        BreakerConfig {
            fail_rate_threshold: self.fail_rate_threshold,
            consecutive_fail_threshold: self.consecutive_fail_threshold,
            window_interval: self.window_interval,
            open_timeout: self.open_timeout,
            minimum_calls_in_window: self.minimum_calls_in_window,
        }
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
