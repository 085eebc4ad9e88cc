//! # Fibonacci Backoff
//!
//! Retry delays for nodes whose reconciliation keeps failing. The delay grows along
//! the Fibonacci sequence and is capped, so a node that fails because of a transient
//! ARM throttle retries quickly while a permanently broken one settles at the cap.
//!
//! ```rust
//! use tag_label_sync::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::from_minutes(1, 10);
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    max: Duration,
    prev: Duration,
    current: Duration,
}

impl FibonacciBackoff {
    /// Sequence starting at `min` (used twice) and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            max,
            prev: Duration::ZERO,
            current: min.min(max),
        }
    }

    #[must_use]
    pub fn from_minutes(min_minutes: u64, max_minutes: u64) -> Self {
        Self::new(
            Duration::from_secs(min_minutes * 60),
            Duration::from_secs(max_minutes * 60),
        )
    }

    /// Current delay; advances the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        delay
    }
}
