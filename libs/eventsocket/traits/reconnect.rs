use std::time::Duration;

/// Minimum delay between connect attempts
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(3_000);

/// Ceiling for the retry delay during long outages
pub const MAX_RETRY_INTERVAL: Duration = Duration::from_millis(300_000);

/// Consecutive failures tolerated before the delay starts growing
pub const FAILURE_THRESHOLD: u32 = 7;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how long the session waits after a
/// physical connection closes before it opens the next one.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next connect attempt
    ///
    /// # Arguments
    /// * `failure_count` - Consecutive failures, already including the one
    ///   that just happened (so always >= 1 when called by the session)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, failure_count: u32) -> Option<Duration>;
}

/// Threshold backoff
///
/// Retries at `min_interval` while `failure_count <= threshold`, then waits
/// `min_interval * failure_count`, capped at `max_interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdBackoff {
    min_interval: Duration,
    max_interval: Duration,
    threshold: u32,
}

impl ThresholdBackoff {
    /// Create a new threshold backoff strategy
    ///
    /// # Arguments
    /// * `min_interval` - Delay used for fast retries and as the growth step
    /// * `max_interval` - Upper bound for any delay
    /// * `threshold` - Failures tolerated before the delay starts growing
    pub fn new(min_interval: Duration, max_interval: Duration, threshold: u32) -> Self {
        Self {
            min_interval,
            max_interval: max_interval.max(min_interval),
            threshold,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for ThresholdBackoff {
    fn default() -> Self {
        Self::new(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL, FAILURE_THRESHOLD)
    }
}

impl ReconnectionStrategy for ThresholdBackoff {
    fn next_delay(&self, failure_count: u32) -> Option<Duration> {
        if failure_count <= self.threshold {
            return Some(self.min_interval);
        }

        let delay = self
            .min_interval
            .checked_mul(failure_count)
            .unwrap_or(self.max_interval);
        Some(delay.min(self.max_interval))
    }
}

/// Never reconnect strategy
///
/// The session goes to `Stopped` after the first close
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _failure_count: u32) -> Option<Duration> {
        None
    }
}
