//! # Delay Provider
//!
//! The randomized "kitchen work" delay is an injected capability so tests can
//! substitute deterministic behavior for wall-clock randomness.

use rand::Rng;
use std::time::Duration;

/// Source of simulated processing delays.
pub trait DelayProvider: Send + Sync {
    /// Draw a delay from `[min, max]` inclusive.
    fn sample(&self, min: Duration, max: Duration) -> Duration;
}

/// Uniform random draw over the configured window. The production provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformDelay;

impl DelayProvider for UniformDelay {
    fn sample(&self, min: Duration, max: Duration) -> Duration {
        if min >= max {
            return min;
        }
        let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Always returns the same delay. For tests and demos.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay(pub Duration);

impl DelayProvider for FixedDelay {
    fn sample(&self, _min: Duration, _max: Duration) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sample_stays_in_window() {
        let provider = UniformDelay;
        let min = Duration::from_millis(100);
        let max = Duration::from_millis(500);
        for _ in 0..100 {
            let d = provider.sample(min, max);
            assert!(d >= min && d <= max, "sample {d:?} outside [{min:?}, {max:?}]");
        }
    }

    #[test]
    fn degenerate_window_returns_bound() {
        let d = UniformDelay.sample(Duration::ZERO, Duration::ZERO);
        assert_eq!(d, Duration::ZERO);
    }

    #[test]
    fn fixed_delay_ignores_window() {
        let provider = FixedDelay(Duration::from_secs(7));
        let d = provider.sample(Duration::ZERO, Duration::from_secs(1));
        assert_eq!(d, Duration::from_secs(7));
    }
}
