use std::thread;
use std::time::Duration;

use rand::Rng;

/// Uniform random pause placed around remote calls so batches and workers
/// do not hit the source in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min: Duration,
    max: Duration,
}

impl Throttle {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn is_disabled(&self) -> bool {
        self.max.is_zero()
    }

    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    pub fn pause(&self) {
        if self.is_disabled() {
            return;
        }
        thread::sleep(self.next_delay());
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::from_millis(1_000, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_in_range() {
        let throttle = Throttle::from_millis(5, 15);
        for _ in 0..200 {
            let delay = throttle.next_delay();
            assert!(delay >= Duration::from_millis(5));
            assert!(delay <= Duration::from_millis(15));
        }
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let throttle = Throttle::from_millis(20, 10);
        assert_eq!(throttle, Throttle::from_millis(10, 20));
    }

    #[test]
    fn disabled_never_sleeps() {
        let throttle = Throttle::disabled();
        assert!(throttle.is_disabled());
        assert_eq!(throttle.next_delay(), Duration::ZERO);
    }
}
