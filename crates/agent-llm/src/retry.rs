//! Retry policy for LLM invocations
//!
//! The default policy retries immediately and treats every error alike, which
//! is what callers of the invocation core rely on. Backoff, per-attempt
//! deadlines and fail-fast classification are opt-in.

use crate::LLMError;
use std::time::Duration;

/// Default number of attempts per invocation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one (at least 1)
    pub max_attempts: u32,

    /// Wait before the second attempt; zero retries immediately
    pub initial_backoff: Duration,

    /// Upper bound for any single wait
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,

    /// Deadline for a single backend call
    pub attempt_timeout: Option<Duration>,

    /// Retry errors that cannot clear on their own (bad key, unknown model)
    pub retry_fatal: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            attempt_timeout: None,
            retry_fatal: true,
        }
    }
}

impl RetryPolicy {
    /// Immediate-retry policy with the given attempt count
    ///
    /// A count of zero is raised to one: an invocation always calls the
    /// backend at least once.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Exponential backoff starting at `initial`, capped at `max`
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Bound each backend call by `timeout`
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Stop retrying on errors that will fail the same way every time
    pub fn fail_fast(mut self) -> Self {
        self.retry_fatal = false;
        self
    }

    /// Calculate backoff duration before attempt number `attempt` (0-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        if !backoff_ms.is_finite() || backoff_ms >= self.max_backoff.as_millis() as f64 {
            self.max_backoff
        } else {
            Duration::from_millis(backoff_ms as u64)
        }
    }

    /// Whether a failure on attempt `attempt` (0-based) leads to another try
    pub fn should_retry(&self, error: &LLMError, attempt: u32) -> bool {
        if attempt + 1 >= self.max_attempts {
            return false;
        }
        self.retry_fatal || !error.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::ZERO);
        assert!(policy.retry_fatal);
        assert!(policy.attempt_timeout.is_none());
    }

    #[test]
    fn test_zero_attempts_raised_to_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }

    #[test]
    fn test_default_retries_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_duration(1), Duration::ZERO);
        assert_eq!(policy.backoff_duration(2), Duration::ZERO);
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5).with_backoff(
            Duration::from_millis(100),
            Duration::from_secs(10),
            2.0,
        );

        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy =
            RetryPolicy::new(10).with_backoff(Duration::from_secs(1), Duration::from_secs(5), 2.0);
        assert_eq!(policy.backoff_duration(10), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        let transient = LLMError::RateLimitExceeded("slow down".to_string());
        let fatal = LLMError::AuthenticationFailed;

        assert!(policy.should_retry(&transient, 0));
        assert!(policy.should_retry(&fatal, 1));
        assert!(!policy.should_retry(&transient, 2));

        let strict = RetryPolicy::default().fail_fast();
        assert!(strict.should_retry(&transient, 0));
        assert!(!strict.should_retry(&fatal, 0));
    }
}
