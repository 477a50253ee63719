use std::time::Duration;

/// Bounded retry with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the backoff added or removed at random (0.0-1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is the 1-based attempt that just failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let jitter_range = capped * self.jitter_factor;
        let jittered = if jitter_range > 0.0 {
            capped + rand::random_range(-jitter_range..jitter_range)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_without_jitter() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            initial_backoff: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            initial_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(2),
            jitter_factor: 0.1,
            ..RetryPolicy::default()
        };
        let delay = policy.backoff(1);
        assert!(delay >= Duration::from_millis(1800));
        assert!(delay <= Duration::from_millis(2200));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
