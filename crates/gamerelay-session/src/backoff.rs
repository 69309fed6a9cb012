//! Reconnect delay policy.
//!
//! The delay is flat: a base interval plus optional random jitter, so a
//! fleet of relays restarted together does not hammer the listener in
//! lockstep. There is no exponential growth; a listener that comes back
//! is picked up within one interval.

use std::time::Duration;

use rand::Rng;

/// How long to wait before the next connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    jitter: Duration,
}

impl ReconnectPolicy {
    /// Always waits exactly `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            jitter: Duration::ZERO,
        }
    }

    /// Waits `base` plus a uniform random amount in `[0, jitter)`.
    pub fn with_jitter(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// The shortest delay this policy can produce.
    pub fn min_delay(&self) -> Duration {
        self.base
    }

    /// The longest delay this policy can produce.
    pub fn max_delay(&self) -> Duration {
        self.base + self.jitter
    }

    /// Picks the delay for the next attempt.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
    }
}

impl Default for ReconnectPolicy {
    /// 5 seconds plus up to 5 seconds of jitter.
    fn default() -> Self {
        Self::with_jitter(Duration::from_secs(5), Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policy_returns_base() {
        let policy = ReconnectPolicy::fixed(Duration::from_secs(3));
        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Duration::from_secs(3));
        }
    }

    #[test]
    fn test_jittered_policy_stays_in_window() {
        let policy = ReconnectPolicy::default();
        for _ in 0..200 {
            let delay = policy.next_delay();
            assert!(delay >= policy.min_delay());
            assert!(delay < policy.max_delay());
        }
    }

    #[test]
    fn test_default_window_is_five_to_ten_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.min_delay(), Duration::from_secs(5));
        assert_eq!(policy.max_delay(), Duration::from_secs(10));
    }
}
