//! Per-organization metadata cache.
//!
//! Option labels and primary-name attributes rarely change, so lookups
//! are kept for twelve hours per organization. Counter state is never
//! cached here.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::error::{NumberingError, PortResultExt};
use crate::ports::{Clock, MetadataSource};

/// How long a cached lookup stays valid.
pub const METADATA_TTL_HOURS: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    OptionLabel { org: String, entity: String, attribute: String, value: i32 },
    PrimaryName { org: String, entity: String },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Caches [`MetadataSource`] answers with a fixed TTL.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MetadataCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Label of an option-set value, cached per org/entity/attribute/value.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::Port`] if the metadata source fails.
    pub fn option_label(
        &self,
        source: &dyn MetadataSource,
        clock: &dyn Clock,
        org: &str,
        entity: &str,
        attribute: &str,
        value: i32,
    ) -> Result<Option<String>, NumberingError> {
        let key = CacheKey::OptionLabel {
            org: org.to_string(),
            entity: entity.to_string(),
            attribute: attribute.to_string(),
            value,
        };
        self.get_or_fetch(key, clock, || {
            source.option_label(entity, attribute, value).port("metadata")
        })
    }

    /// Primary-name attribute of an entity, cached per org/entity.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::Port`] if the metadata source fails.
    pub fn primary_name_attribute(
        &self,
        source: &dyn MetadataSource,
        clock: &dyn Clock,
        org: &str,
        entity: &str,
    ) -> Result<String, NumberingError> {
        let key = CacheKey::PrimaryName { org: org.to_string(), entity: entity.to_string() };
        let name = self.get_or_fetch(key, clock, || {
            source.primary_name_attribute(entity).port("metadata").map(Some)
        })?;
        Ok(name.unwrap_or_default())
    }

    fn get_or_fetch(
        &self,
        key: CacheKey,
        clock: &dyn Clock,
        fetch: impl FnOnce() -> Result<Option<String>, NumberingError>,
    ) -> Result<Option<String>, NumberingError> {
        let now = clock.now();
        if let Some(entry) = self.lock().get(&key) {
            if entry.expires_at > now {
                return Ok(entry.value.clone());
            }
        }

        let value = fetch()?;
        let expires_at = now + Duration::hours(METADATA_TTL_HOURS);
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key, CacheEntry { value: value.clone(), expires_at });
        Ok(value)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A poisoned cache only holds stale lookups; keep using it.
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::adapters::memory::FixedClock;
    use crate::ports::PortError;

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl MetadataSource for CountingSource {
        fn option_label(&self, _: &str, _: &str, value: i32) -> Result<Option<String>, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("label-{value}")))
        }

        fn primary_name_attribute(&self, entity: &str) -> Result<String, PortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{entity}name"))
        }
    }

    #[test]
    fn second_lookup_hits_cache() {
        let source = CountingSource::default();
        let clock = FixedClock::at("2025-01-01T00:00:00Z");
        let cache = MetadataCache::new();

        let first = cache.option_label(&source, &clock, "org", "case", "priority", 2).unwrap();
        let second = cache.option_label(&source, &clock, "org", "case", "priority", 2).unwrap();

        assert_eq!(first.as_deref(), Some("label-2"));
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn organizations_are_cached_separately() {
        let source = CountingSource::default();
        let clock = FixedClock::at("2025-01-01T00:00:00Z");
        let cache = MetadataCache::new();

        cache.primary_name_attribute(&source, &clock, "org-a", "account").unwrap();
        cache.primary_name_attribute(&source, &clock, "org-b", "account").unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn entries_expire_after_twelve_hours() {
        let source = CountingSource::default();
        let clock = FixedClock::at("2025-01-01T00:00:00Z");
        let cache = MetadataCache::new();

        cache.primary_name_attribute(&source, &clock, "org", "account").unwrap();
        clock.advance(Duration::hours(METADATA_TTL_HOURS) + Duration::seconds(1));
        let name = cache.primary_name_attribute(&source, &clock, "org", "account").unwrap();

        assert_eq!(name, "accountname");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entries_are_evicted_on_insert() {
        let source = CountingSource::default();
        let clock = FixedClock::at("2025-01-01T00:00:00Z");
        let cache = MetadataCache::new();

        cache.option_label(&source, &clock, "org", "case", "priority", 1).unwrap();
        cache.option_label(&source, &clock, "org", "case", "priority", 2).unwrap();
        assert_eq!(cache.len(), 2);

        clock.advance(Duration::hours(METADATA_TTL_HOURS) + Duration::seconds(1));
        cache.primary_name_attribute(&source, &clock, "org", "account").unwrap();
        assert_eq!(cache.len(), 1);
    }
}
