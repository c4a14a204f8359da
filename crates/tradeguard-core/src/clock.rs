//! Injected time source.
//!
//! Every component that needs "now" reads it through [`Clock`], never
//! `Utc::now()` directly, so time-based behavior is reproducible in tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and replays.
///
/// Thread-safe: can be shared across threads via `Arc<ManualClock>`.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at a Unix timestamp in milliseconds.
    ///
    /// Out-of-range timestamps fall back to the Unix epoch.
    #[must_use]
    pub fn at_millis(ms: i64) -> Self {
        let start = Utc
            .timestamp_millis_opt(ms)
            .single()
            .unwrap_or_default();
        Self::new(start)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::at_millis(1_700_000_000_000);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_millis(0);
        clock.advance_ms(900_000);
        assert_eq!(clock.now().timestamp_millis(), 900_000);

        clock.advance(Duration::minutes(1));
        assert_eq!(clock.now().timestamp_millis(), 960_000);
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at_millis(0);
        let target = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
