//! Jittered exponential backoff for `ServerSupervisor`'s reconnect loop.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Uniform jitter applied as `delay * (1 +/- jitter_fraction)`.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// The delay to wait before the `attempt`-th reconnect attempt
    /// (0-indexed: `attempt == 0` is the first retry after an initial
    /// failure). spec.md §4.5: `min(initial * multiplier^(attempt-1), max) *
    /// (1 + uniform(0, jitter_fraction))` — jitter only ever lengthens the
    /// delay, never shortens it.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let base_secs = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_fraction);
        let secs = base_secs * (1.0 + jitter);
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_then_clamps() {
        let policy = RetryPolicy::default();
        let first = policy.delay_for(0);
        let later = policy.delay_for(20);
        assert!(first <= Duration::from_millis(600));
        assert!(later <= policy.max_delay.mul_f64(1.0 + policy.jitter_fraction + 0.01));
    }

    #[test]
    fn delay_never_exceeds_jittered_max() {
        let policy = RetryPolicy::default();
        for attempt in 0..40 {
            let delay = policy.delay_for(attempt);
            assert!(delay <= policy.max_delay.mul_f64(1.0 + policy.jitter_fraction + 0.01));
        }
    }
}
