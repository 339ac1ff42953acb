use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Keeps at least `interval` between consecutive API calls.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until the next call may go out and records it as sent.
    pub fn wait(&self) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let pause = remaining(*last, now, self.interval);
        if !pause.is_zero() {
            tracing::debug!(pause_ms = pause.as_millis() as u64, "pacing API call");
            thread::sleep(pause);
        }
        *last = Some(Instant::now());
    }
}

fn remaining(last: Option<Instant>, now: Instant, interval: Duration) -> Duration {
    match last {
        Some(last) => interval.saturating_sub(now.saturating_duration_since(last)),
        None => Duration::ZERO,
    }
}

/// Exponential backoff for quota and transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(32),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based), or `None` once retries
    /// are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let backoff = Backoff {
            max_retries: 8,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(4),
        };
        assert_eq!(backoff.delay(0), Some(Duration::from_millis(500)));
        assert_eq!(backoff.delay(1), Some(Duration::from_secs(1)));
        assert_eq!(backoff.delay(3), Some(Duration::from_secs(4)));
        assert_eq!(backoff.delay(7), Some(Duration::from_secs(4)));
        assert_eq!(backoff.delay(8), None);
    }

    #[test]
    fn remaining_interval() {
        let now = Instant::now();
        let interval = Duration::from_secs(1);
        assert_eq!(remaining(None, now, interval), Duration::ZERO);
        assert_eq!(remaining(Some(now), now, interval), interval);
        let later = now + Duration::from_secs(2);
        assert_eq!(remaining(Some(now), later, interval), Duration::ZERO);
    }

    #[test]
    fn first_call_is_not_delayed() {
        let pacer = Pacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
