// Backoff policy for ticket-monitor requests. Only gateway timeouts are
// retried; every other failure surfaces on the first attempt.

use std::time::Duration;

use crate::config::FetchConfig;

pub const GATEWAY_TIMEOUT: u16 = 504;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
        )
    }

    /// Delay before the retry that follows attempt `attempt_index` (zero based)
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Whether a response with `status` on attempt `attempt_index` earns another try
    pub fn should_retry(&self, status: u16, attempt_index: u32) -> bool {
        status == GATEWAY_TIMEOUT && attempt_index + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(64, Duration::from_secs(1));
        assert_eq!(policy.delay_for(40), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[test]
    fn test_only_gateway_timeout_is_retried() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(504, 0));
        assert!(policy.should_retry(504, 1));
        assert!(!policy.should_retry(504, 2), "third attempt is the last one");
        assert!(!policy.should_retry(500, 0));
        assert!(!policy.should_retry(502, 0));
        assert!(!policy.should_retry(404, 0));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(504, 0));
    }

    #[test]
    fn test_from_config() {
        let config = FetchConfig {
            max_attempts: 5,
            initial_delay_ms: 250,
            timeout_seconds: 30,
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
    }
}
