use reqwest::StatusCode;
use std::time::Duration;

/// Bounded retry with exponential backoff for the remote capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts.max(1)
    }

    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.base_delay.saturating_mul(1 << capped)
    }

    pub fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    pub fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(5), policy.backoff(9));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(0));
        assert!(policy.allows_retry(1));
        assert!(!policy.allows_retry(2));
        assert!(!RetryPolicy::none().allows_retry(0));
    }

    #[test]
    fn only_transient_statuses_are_retried() {
        assert!(RetryPolicy::should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::should_retry_status(StatusCode::BAD_GATEWAY));
        assert!(!RetryPolicy::should_retry_status(StatusCode::UNAUTHORIZED));
        assert!(!RetryPolicy::should_retry_status(StatusCode::BAD_REQUEST));
    }
}
