//! Fixed-interval retry policy for part uploads

use std::time::Duration;

/// Default retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 2;

/// Default wait between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);

/// Bounded retry with a constant delay: no growth, no jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Wait between a failed attempt and the next one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Total attempts allowed, first try included
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based),
    /// or `None` once attempts are exhausted
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts() {
            Some(self.backoff)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff, Duration::from_secs(15));
    }

    #[test]
    fn test_delay_is_constant_until_exhausted() {
        let policy = RetryPolicy::new(2, Duration::from_secs(15));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(15)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(15)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_zero_retries() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
    }
}
