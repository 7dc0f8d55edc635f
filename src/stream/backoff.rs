//! Reconnect backoff policy.

use rand::Rng;
use std::time::Duration;

/// Hard lower bound for any reconnect delay.
pub const MIN_RETRY_FLOOR: Duration = Duration::from_millis(50);

/// Fraction of the base delay added as random jitter.
const JITTER_RATIO: f64 = 0.1;

/// Exponential backoff with jitter, clamped to `[min, max]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = min.max(MIN_RETRY_FLOOR);
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// Returns the delay before the next attempt and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);

        let jitter = rand::thread_rng().gen_range(0.0..=JITTER_RATIO);
        base.mul_f64(1.0 + jitter).clamp(self.min, self.max)
    }

    /// Restarts the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(700));

        let delays: Vec<Duration> = (0..6).map(|_| backoff.next_delay()).collect();

        assert!(delays[0] >= Duration::from_millis(100));
        assert!(delays[0] <= Duration::from_millis(110));
        assert!(delays[1] >= Duration::from_millis(200));
        assert!(delays[2] >= Duration::from_millis(400));
        for delay in &delays[3..] {
            assert_eq!(*delay, Duration::from_millis(700));
        }
    }

    #[test]
    fn test_backoff_never_below_floor() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::ZERO);
        for _ in 0..10 {
            assert!(backoff.next_delay() >= MIN_RETRY_FLOOR);
        }
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(110));
    }
}
