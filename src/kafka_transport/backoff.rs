//! Exponential backoff used between opt-in resend attempts.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::RetryPolicy;

/// Floor applied to jittered delays.
const MIN_SLEEP_MS: u64 = 10;

/// Tracks consecutive failures and produces the next delay.
pub struct BackoffState {
    policy: RetryPolicy,
    current: Duration,
    failures: u32,
    rng: StdRng,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            current: policy.min_timeout(),
            failures: 0,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Forget previous failures so the next delay starts at the minimum.
    pub fn reset(&mut self) {
        self.current = self.policy.min_timeout();
        self.failures = 0;
    }

    /// Delay to wait before the next attempt following a failure.
    pub fn next_delay(&mut self) -> Duration {
        if self.failures > 0 {
            let factor = self.policy.factor.max(1);
            self.current = self
                .current
                .saturating_mul(factor)
                .min(self.policy.max_timeout());
        }
        self.failures = self.failures.saturating_add(1);

        if !self.policy.randomize {
            return self.current;
        }
        let max_ms = u64::try_from(self.current.as_millis()).unwrap_or(u64::MAX);
        let sleep_ms = match max_ms {
            0..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        Duration::from_millis(sleep_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(min_ms: u64, max_ms: u64, randomize: bool) -> RetryPolicy {
        RetryPolicy {
            min_timeout_ms: min_ms,
            max_timeout_ms: max_ms,
            randomize,
            ..RetryPolicy::default()
        }
    }

    #[rstest]
    fn delays_grow_by_factor_until_cap() {
        let mut backoff = BackoffState::new(policy(100, 350, false));
        let delays: Vec<_> = (0..4).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [100, 200, 350, 350].map(Duration::from_millis).to_vec()
        );
    }

    #[rstest]
    fn reset_returns_to_minimum() {
        let mut backoff = BackoffState::new(policy(100, 1_000, false));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[rstest]
    fn jitter_stays_within_window() {
        let mut backoff = BackoffState::new(policy(50, 50, true));
        for _ in 0..32 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(MIN_SLEEP_MS));
            assert!(delay <= Duration::from_millis(50));
        }
    }

    #[rstest]
    fn zero_minimum_yields_zero_delay() {
        let mut backoff = BackoffState::new(policy(0, 0, true));
        assert_eq!(backoff.next_delay(), Duration::ZERO);
    }
}
