use rand::Rng;
use std::time::Duration;

/// Bounded exponential retry policy with jitter.
///
/// Delay for attempt `n` (0-based): min(max_delay, base * 2^n) + random_jitter.
/// Attempts past `max_attempts` are refused so callers cannot loop forever.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base: Duration,
    max_delay: Duration,
    max_attempts: u32,
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy.
    ///
    /// Negative jitter factors are clamped to 0.
    pub fn new(base: Duration, max_delay: Duration, max_attempts: u32, jitter_factor: f64) -> Self {
        Self {
            base,
            max_delay,
            max_attempts,
            jitter_factor: jitter_factor.max(0.0),
        }
    }

    /// Maximum number of retries this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another retry is permitted after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.max_delay);

        let jitter_range = capped.as_secs_f64() * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_secs_f64((capped.as_secs_f64() + jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            5,
            0.0, // no jitter for deterministic assertions
        );

        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_caps_at_max() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(5), 10, 0.0);
        assert_eq!(policy.delay(9), Duration::from_secs(5));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::new(Duration::from_millis(10), Duration::from_secs(1), 3, 0.0);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(60), 1, 0.2);
        let secs = policy.delay(0).as_secs_f64();
        assert!((8.0..=12.0).contains(&secs), "delay was {}", secs);
    }

    #[test]
    fn negative_jitter_clamped() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 1, -0.5);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
    }
}
