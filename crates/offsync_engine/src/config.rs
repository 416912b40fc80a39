//! Configuration for the sync engine.

use rand::Rng;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// URL of the remote sync endpoint.
    pub endpoint: String,
    /// Interval of the scheduler's periodic drain.
    pub sync_interval: Duration,
    /// Whether the scheduler drains without caller involvement.
    pub auto_sync: bool,
    /// Request timeout handed to the HTTP client.
    pub request_timeout: Duration,
    /// Hold back later operations of a resource once one of its operations
    /// fails or conflicts within a pass.
    pub per_resource_barrier: bool,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sync_interval: Duration::from_secs(30),
            auto_sync: true,
            request_timeout: Duration::from_secs(30),
            per_resource_barrier: false,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the scheduler interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Enables or disables automatic sync.
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables or disables the per-resource barrier.
    pub fn with_per_resource_barrier(mut self, enabled: bool) -> Self {
        self.per_resource_barrier = enabled;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Configuration for per-operation retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Failed attempts after which an operation is dead-lettered.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration with the given ceiling.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Retries on every pass, forever, without delay.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Keeps the ceiling but retries on the very next pass.
    pub fn no_backoff(mut self) -> Self {
        self.initial_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self.add_jitter = false;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Returns true once `retry_count` failed attempts exhaust the budget.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        self.max_attempts.is_some_and(|max| retry_count >= max)
    }

    /// Calculates the delay after the given number of failed attempts.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter && delay_secs > 0.0 {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen_range(0.0..1.0);
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://api.example.com/sync")
            .with_sync_interval(Duration::from_secs(5))
            .with_auto_sync(false)
            .with_request_timeout(Duration::from_secs(60))
            .with_per_resource_barrier(true);

        assert_eq!(config.endpoint, "https://api.example.com/sync");
        assert_eq!(config.sync_interval, Duration::from_secs(5));
        assert!(!config.auto_sync);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.per_resource_barrier);
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert!(config.auto_sync);
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, Some(10));
    }

    #[test]
    fn unbounded_never_exhausts() {
        let config = RetryConfig::unbounded();
        assert!(!config.is_exhausted(u32::MAX));
        assert_eq!(config.delay_for_attempt(7), Duration::ZERO);
    }

    #[test]
    fn ceiling_exhausts() {
        let config = RetryConfig::new(3);
        assert!(!config.is_exhausted(2));
        assert!(config.is_exhausted(3));
        assert!(config.is_exhausted(4));
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
        assert!(delay2 <= Duration::from_millis(250));
    }

    #[test]
    fn retry_delay_without_jitter_is_exact() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        assert!(delay <= Duration::from_millis(6250));
    }

    #[test]
    fn no_backoff_keeps_ceiling() {
        let config = RetryConfig::new(4).no_backoff();
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
        assert!(config.is_exhausted(4));
    }
}
