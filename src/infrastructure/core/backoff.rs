use rand::Rng;
use std::time::Duration;

/// Exponential backoff with full jitter: `random(0, min(cap, base * factor^attempt))`.
/// `attempt` is zero-based (the delay before the *first* retry uses `attempt = 0`).
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        Self { base, factor, cap }
    }

    /// Broker fetch retry policy: base 1s, factor 2, cap 60s.
    pub const fn broker() -> Self {
        Self::new(Duration::from_secs(1), 2, Duration::from_secs(60))
    }

    /// Delivery 5xx/network retry policy: base 1s, factor 2, cap 5 minutes.
    pub const fn delivery() -> Self {
        Self::new(Duration::from_secs(1), 2, Duration::from_secs(5 * 60))
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let uncapped = self.base.saturating_mul(self.factor.saturating_pow(attempt));
        let capped = uncapped.min(self.cap);
        let jittered_millis = rand::rng().random_range(0..=capped.as_millis().max(1) as u64);
        Duration::from_millis(jittered_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_cap() {
        let policy = BackoffPolicy::broker();
        for attempt in 0..10 {
            assert!(policy.delay_for_attempt(attempt) <= policy.cap);
        }
    }

    #[test]
    fn delay_grows_with_attempt_on_average() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 2, Duration::from_secs(60));
        // attempt 0 is capped at ~100ms, attempt 5 at ~3200ms; jitter means we
        // can only assert the cap used for sampling grew, not any one sample.
        let cap_at = |attempt: u32| policy.base.saturating_mul(policy.factor.saturating_pow(attempt)).min(policy.cap);
        assert!(cap_at(5) > cap_at(0));
    }
}
