//! Simulation Clock
//!
//! Monotonic simulated clock with microsecond resolution.
//! Single source of truth for bus time — never call system time.

use std::fmt;

/// Microseconds since an arbitrary epoch chosen by the caller.
/// i64 gives us ample range for any simulated session.
pub type Micros = i64;

/// Conversion constants.
pub const MICROS_PER_MILLI: i64 = 1_000;
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// The smallest latency the bus will ever schedule.
pub const MIN_LATENCY_US: Micros = 1;

/// Monotonic simulation clock.
///
/// # Determinism contract
/// - `now()` returns the current bus time, never system time.
/// - `advance_to()` only moves forward; it panics on backward movement,
///   since time never moves backward is an invariant of the bus (spec §3).
#[derive(Debug, Clone)]
pub struct SimClock {
    current: Micros,
}

impl SimClock {
    #[inline]
    pub fn new(start_time: Micros) -> Self {
        Self {
            current: start_time,
        }
    }

    #[inline]
    pub fn now(&self) -> Micros {
        self.current
    }

    /// Advance clock to a new time. Panics if time would go backward.
    #[inline]
    pub fn advance_to(&mut self, new_time: Micros) {
        assert!(
            new_time >= self.current,
            "SimClock: cannot go backward from {} to {}",
            self.current,
            new_time
        );
        self.current = new_time;
    }

    #[inline]
    pub fn is_past(&self, time: Micros) -> bool {
        time < self.current
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.current / MICROS_PER_SEC;
        let micros = self.current % MICROS_PER_SEC;
        write!(f, "{}.{:06}s", secs, micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_monotonic() {
        let mut clock = SimClock::new(1_000_000);
        assert_eq!(clock.now(), 1_000_000);

        clock.advance_to(2_000_000);
        assert_eq!(clock.now(), 2_000_000);
    }

    #[test]
    #[should_panic(expected = "cannot go backward")]
    fn clock_backward_panics() {
        let mut clock = SimClock::new(1_000_000);
        clock.advance_to(500_000);
    }

    #[test]
    fn clock_is_past() {
        let clock = SimClock::new(1_000);
        assert!(clock.is_past(500));
        assert!(!clock.is_past(1_000));
        assert!(!clock.is_past(1_500));
    }
}
