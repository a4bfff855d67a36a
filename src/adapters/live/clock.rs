//! System clock.

use chrono::{DateTime, Utc};

use crate::ports::Clock;

/// Reads the wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_wall_clock() {
        let before = Utc::now();
        let now = LiveClock.now();
        assert!(now >= before && now <= Utc::now());
    }
}
