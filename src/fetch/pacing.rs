//! Request pacing for remote APIs.
//!
//! Both remote sources impose request cadences (Last.fm ~5 req/s, Discogs
//! ~1 req/s). The gate enforces a minimum inter-call delay regardless of how
//! long the previous call took.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A token-paced call gate: `wait()` blocks until at least the configured
/// interval has passed since the previous `wait()` returned.
pub struct CallGate {
    interval: Duration,
    last_call: Mutex<Instant>,
}

impl CallGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            // Backdated so the first call never waits
            last_call: Mutex::new(Instant::now() - interval),
        }
    }

    pub fn wait(&self) {
        let mut last = self.last_call.lock().unwrap();
        let elapsed = last.elapsed();
        if elapsed < self.interval {
            std::thread::sleep(self.interval - elapsed);
        }
        *last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_does_not_wait() {
        let gate = CallGate::new(Duration::from_millis(200));
        let started = Instant::now();
        gate.wait();
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_consecutive_calls_are_spaced() {
        let gate = CallGate::new(Duration::from_millis(30));
        gate.wait();
        let started = Instant::now();
        gate.wait();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_no_wait_after_interval_elapsed() {
        let gate = CallGate::new(Duration::from_millis(20));
        gate.wait();
        std::thread::sleep(Duration::from_millis(25));
        let started = Instant::now();
        gate.wait();
        assert!(started.elapsed() < Duration::from_millis(15));
    }
}
