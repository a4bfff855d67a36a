//! `{@format}`: the current time in the owner's zone.

use chrono_tz::Tz;

use crate::ports::Clock;
use crate::template::datefmt::format_date;

/// Formats "now" for `zone`.
#[must_use]
pub fn current_date(clock: &dyn Clock, zone: Tz, format: &str) -> String {
    format_date(&clock.now().with_timezone(&zone), format)
}
