//! Clock and time-zone ports.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::PortError;

/// Provides the current time.
///
/// Reset policy and `{@...}` directives read time through this port so
/// tests can pin "now".
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Resolves the time zone a config owner works in.
pub trait TimeZones: Send + Sync {
    /// Returns the owner's zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner's settings cannot be read.
    fn zone_for(&self, owner: &str) -> Result<Tz, PortError>;
}
