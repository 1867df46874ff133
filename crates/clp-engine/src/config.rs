//! Engine configuration.

use std::time::Duration;

/// Polling and retry configuration for the engine components.
///
/// The poll interval and the delete-conflict retry bound are tunable
/// implementation parameters, not product guarantees. Both exist as
/// explicit injected configuration so tests can tighten them; there is no
/// package-level mutable state.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait between consecutive activation status queries.
    pub poll_interval: Duration,
    /// Overall deadline for one activate/deactivate call; `None` waits
    /// until the caller cancels.
    pub timeout: Option<Duration>,
    /// How many times a policy deletion is retried when the store reports
    /// a pending-activation conflict.
    pub delete_retry_limit: u32,
    /// Wait between delete-conflict retries.
    pub delete_retry_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(20 * 60)),
            delete_retry_limit: 3,
            delete_retry_backoff: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder: set the overall per-call deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set the delete-conflict retry bound.
    #[must_use]
    pub const fn with_delete_retry_limit(mut self, limit: u32) -> Self {
        self.delete_retry_limit = limit;
        self
    }

    /// Builder: set the delete-conflict retry backoff.
    #[must_use]
    pub const fn with_delete_retry_backoff(mut self, backoff: Duration) -> Self {
        self.delete_retry_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PollConfig::new()
            .with_poll_interval(Duration::from_millis(5))
            .with_timeout(None)
            .with_delete_retry_limit(1)
            .with_delete_retry_backoff(Duration::from_millis(1));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.timeout, None);
        assert_eq!(config.delete_retry_limit, 1);
        assert_eq!(config.delete_retry_backoff, Duration::from_millis(1));
    }
}
