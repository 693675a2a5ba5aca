//! Time abstraction
//!
//! Staleness thresholds, retry backoff, and idle timeouts all depend on the
//! clock, so the clock goes through a trait. Production uses the wall
//! clock; tests use a manually advanced clock to exercise reconciliation
//! and backoff without sleeping.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider abstraction
///
/// Code that needs the current time or a sleep uses this trait rather than
/// `SystemTime::now()` so the behavior stays testable.
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    async fn sleep_ms(&self, ms: u64);
}

/// Production time provider using the system clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }
}

/// Manually advanced clock for tests
///
/// `sleep_ms` advances the clock instead of waiting, so timeout and
/// staleness paths run instantly under test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock starting at the given epoch milliseconds
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Advance the clock
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clone for ManualClock {
    fn clone(&self) -> Self {
        Self {
            now_ms: self.now_ms.clone(),
        }
    }
}

#[async_trait]
impl TimeProvider for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.sleep_ms(500).await;
        assert_eq!(clock.now_ms(), 1_500);

        clock.advance_ms(100);
        assert_eq!(clock.now_ms(), 1_600);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(0);
        let other = clock.clone();
        clock.advance_ms(42);
        assert_eq!(other.now_ms(), 42);
    }

    #[test]
    fn test_wall_clock_is_nonzero() {
        assert!(WallClockTime::new().now_ms() > 0);
    }
}
