//! Fixed clock that only moves when told to.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::ports::clock::Clock;

/// Clock pinned to a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned to `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Creates a clock pinned to an RFC 3339 timestamp.
    ///
    /// # Panics
    ///
    /// Panics if `rfc3339` is not a valid timestamp.
    #[must_use]
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .expect("FixedClock::at: invalid RFC 3339 timestamp")
            .with_timezone(&Utc);
        Self::new(now)
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }

    /// Pins the clock to a new instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_only_moves_when_advanced() {
        let clock = FixedClock::at("2024-06-15T10:30:00Z");
        assert_eq!(clock.now(), clock.now());

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now().to_rfc3339(), "2024-06-15T10:35:00+00:00");
    }
}
