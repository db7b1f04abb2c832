//! Reconnect backoff policy
//!
//! One counter per pool, shared by every slot: when many slots drop at once
//! (backend restart), the first round of reconnects spreads over a similar
//! jittered window, and only sustained failure pushes the delay up the
//! exponential table.

use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Delay cap once the exponential table is exhausted
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Upper bound (exclusive) on the random jitter added to every delay
const MAX_JITTER_MS: u64 = 1000;

/// Per-pool reconnect attempt counter with exponential delay
///
/// The counter is advanced *after* each delay elapses and reset the moment a
/// reconnect reaches `Connected`, so simultaneous drops share the same delay
/// window before backing off further.
#[derive(Debug, Default)]
pub struct RetryBackoff {
    attempts: AtomicU32,
}

impl RetryBackoff {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU32::new(0),
        }
    }

    /// Current consecutive-failure count
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Delay to apply before the next reconnect attempt, jitter included
    pub fn current_delay(&self) -> Duration {
        base_delay(self.attempts()) + jitter()
    }

    /// Record that a delay has elapsed and an attempt is underway
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset to the base delay after a successful reconnect
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Relaxed);
    }
}

/// Delay table before jitter:
///
/// attempts:      0, 1, 2, 3, 4,  5,  6+
/// delay seconds: 1, 2, 4, 8, 16, 32, 60
pub fn base_delay(attempts: u32) -> Duration {
    if attempts > 5 {
        MAX_DELAY
    } else {
        Duration::from_secs(1 << attempts)
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_table() {
        assert_eq!(base_delay(0), Duration::from_secs(1));
        assert_eq!(base_delay(1), Duration::from_secs(2));
        assert_eq!(base_delay(2), Duration::from_secs(4));
        assert_eq!(base_delay(3), Duration::from_secs(8));
        assert_eq!(base_delay(4), Duration::from_secs(16));
        assert_eq!(base_delay(5), Duration::from_secs(32));
        assert_eq!(base_delay(6), Duration::from_secs(60));
        assert_eq!(base_delay(100), Duration::from_secs(60));
    }

    #[test]
    fn test_monotonic_up_to_cap() {
        let mut previous = Duration::ZERO;
        for attempts in 0..20 {
            let delay = base_delay(attempts);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(60));
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_stays_in_bound() {
        for _ in 0..200 {
            let j = jitter();
            assert!(j < Duration::from_millis(MAX_JITTER_MS));
        }
    }

    #[test]
    fn test_current_delay_includes_jitter_only() {
        let backoff = RetryBackoff::new();
        for _ in 0..50 {
            let delay = backoff.current_delay();
            assert!(delay >= Duration::from_secs(1));
            assert!(delay < Duration::from_secs(2));
        }
    }

    #[test]
    fn test_reset_returns_to_base() {
        let backoff = RetryBackoff::new();
        for _ in 0..4 {
            backoff.record_attempt();
        }
        assert_eq!(backoff.attempts(), 4);
        assert!(backoff.current_delay() >= Duration::from_secs(16));

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.current_delay() < Duration::from_secs(2));
    }
}
