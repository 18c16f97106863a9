use crate::app::ports::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::trace;

/// Process-wide minimum spacing between outbound requests.
///
/// The lock is held while waiting, so concurrent callers queue up and each one
/// still observes the full interval after its predecessor.
pub struct RateLimiter {
    min_interval: Duration,
    clock: Arc<dyn Clock>,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `min_interval = 1 / max(qps, min_qps)`.
    pub fn from_qps(qps: f64, min_qps: f64, clock: Arc<dyn Clock>) -> Self {
        let effective = qps.max(min_qps);
        let min_interval = if effective.is_finite() && effective > 0.0 {
            Duration::from_secs_f64(1.0 / effective)
        } else {
            Duration::ZERO
        };
        Self::with_interval(min_interval, clock)
    }

    pub fn with_interval(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            clock,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the minimum interval since the previous acquisition has elapsed.
    pub fn acquire(&self) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = *last {
            let elapsed = self.clock.now().saturating_duration_since(prev);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!("rate limiter sleeping {:?}", wait);
                self.clock.sleep(wait);
            }
        }
        *last = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ManualClock, SystemClock};

    #[test]
    fn test_interval_from_qps_and_floor() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::from_qps(4.0, 0.1, clock.clone());
        assert_eq!(limiter.min_interval(), Duration::from_millis(250));

        let floored = RateLimiter::from_qps(0.0, 0.1, clock);
        assert_eq!(floored.min_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_first_acquire_does_not_wait() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::from_qps(2.0, 0.1, clock.clone());
        limiter.acquire();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_consecutive_acquires_are_spaced() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::from_qps(2.0, 0.1, clock.clone());

        let mut starts = Vec::new();
        for _ in 0..5 {
            limiter.acquire();
            starts.push(clock.now());
        }

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_only_remaining_interval_is_slept() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::from_qps(1.0, 0.1, clock.clone());

        limiter.acquire();
        clock.advance(Duration::from_millis(300));
        limiter.acquire();
        clock.advance(Duration::from_secs(2));
        limiter.acquire();

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(700)]);
    }

    #[test]
    fn test_concurrent_callers_stay_spaced() {
        let limiter = Arc::new(RateLimiter::with_interval(
            Duration::from_millis(20),
            Arc::new(SystemClock),
        ));
        let started = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..3 {
                        limiter.acquire();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total = started.elapsed();
        assert!(total >= Duration::from_millis(20 * 11));
    }
}
