//! A monotonic-time abstraction (component C1) so the Publish Engine never
//! reads the wall clock directly. Production code uses `SystemClock`; tests
//! use `VirtualClock`, which only ever advances when explicitly told to,
//! making tick-by-tick scenarios (spec §8) reproducible.

use std::cell::Cell;

use opcua_types::DateTime;

pub trait Clock {
    fn now(&self) -> DateTime;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// A clock that only moves forward when `advance_ms` is called.
///
/// Single-threaded by design (spec §5: "the engine and its subscriptions are
/// non-reentrant"), so a `Cell` is enough; no locking is needed.
#[derive(Debug)]
pub struct VirtualClock {
    now: Cell<DateTime>,
}

impl VirtualClock {
    pub fn new(start: DateTime) -> Self {
        VirtualClock { now: Cell::new(start) }
    }

    pub fn advance_ms(&self, ms: i64) {
        let next = self.now.get() + chrono::Duration::milliseconds(ms);
        self.now.set(next);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_only_moves_on_advance() {
        let start = DateTime::now();
        let clock = VirtualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance_ms(1000);
        assert_eq!(clock.now().since_ms(&start), 1000);
        assert_eq!(clock.now().since_ms(&start), 1000);
        clock.advance_ms(500);
        assert_eq!(clock.now().since_ms(&start), 1500);
    }
}
