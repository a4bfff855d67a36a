//! Static metadata and time-zone tables.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono_tz::Tz;

use crate::ports::metadata::DEFAULT_PRIMARY_NAME;
use crate::ports::{MetadataSource, PortError, TimeZones};

/// Metadata answered from fixed tables.
#[derive(Default)]
pub struct StaticMetadata {
    labels: BTreeMap<(String, String, i32), String>,
    primary_names: BTreeMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticMetadata {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an option-set label.
    #[must_use]
    pub fn with_label(mut self, entity: &str, attribute: &str, value: i32, label: &str) -> Self {
        self.labels.insert((entity.to_string(), attribute.to_string(), value), label.to_string());
        self
    }

    /// Registers an entity's primary-name attribute.
    #[must_use]
    pub fn with_primary_name(mut self, entity: &str, attribute: &str) -> Self {
        self.primary_names.insert(entity.to_string(), attribute.to_string());
        self
    }

    /// Number of lookups served.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl MetadataSource for StaticMetadata {
    fn option_label(
        &self,
        entity: &str,
        attribute: &str,
        value: i32,
    ) -> Result<Option<String>, PortError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.get(&(entity.to_string(), attribute.to_string(), value)).cloned())
    }

    fn primary_name_attribute(&self, entity: &str) -> Result<String, PortError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .primary_names
            .get(entity)
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRIMARY_NAME.to_string()))
    }
}

/// Owner time zones from a fixed table; unknown owners get the default.
pub struct StaticTimeZones {
    zones: BTreeMap<String, Tz>,
    default: Tz,
}

impl StaticTimeZones {
    /// Every owner in `default`.
    #[must_use]
    pub fn new(default: Tz) -> Self {
        Self { zones: BTreeMap::new(), default }
    }

    /// Assigns an owner's zone.
    #[must_use]
    pub fn with_owner(mut self, owner: &str, zone: Tz) -> Self {
        self.zones.insert(owner.to_string(), zone);
        self
    }
}

impl Default for StaticTimeZones {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl TimeZones for StaticTimeZones {
    fn zone_for(&self, owner: &str) -> Result<Tz, PortError> {
        Ok(self.zones.get(owner).copied().unwrap_or(self.default))
    }
}
