//! `{$field}` resolution, including lookup chains.

use std::collections::HashMap;

use chrono_tz::Tz;
use tracing::debug;

use crate::error::{NumberingError, PortResultExt};
use crate::metadata::MetadataCache;
use crate::model::{EntityRef, Record, Value};
use crate::ports::{Clock, MetadataSource, RecordStore};
use crate::template::datefmt::format_date;
use crate::template::FieldPath;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collaborators a field lookup may reach out to.
pub struct FieldSources<'a> {
    /// Fetches referenced records.
    pub records: &'a dyn RecordStore,
    /// Option labels and primary names.
    pub metadata: &'a dyn MetadataSource,
    /// Long-lived metadata cache.
    pub cache: &'a MetadataCache,
    /// Drives cache expiry.
    pub clock: &'a dyn Clock,
    /// Organization the cache is keyed on.
    pub organization: &'a str,
    /// Owner's zone for date values.
    pub zone: Tz,
}

enum Lookup {
    Found(Option<String>),
    Missing { entity: String, field: String },
}

/// Resolves field references against one record, memoizing per generation.
pub struct FieldResolver<'a> {
    sources: FieldSources<'a>,
    record: Record,
    memo: HashMap<String, Option<String>>,
}

impl<'a> FieldResolver<'a> {
    /// Creates a resolver over `record`.
    #[must_use]
    pub fn new(sources: FieldSources<'a>, record: Record) -> Self {
        Self { sources, record, memo: HashMap::new() }
    }

    /// Resolves `path`. `Ok(None)` is a null value, or a missing one when
    /// `suppress` is set.
    ///
    /// # Errors
    ///
    /// Returns [`NumberingError::FieldMissing`] for absent fields unless
    /// suppressed, [`NumberingError::NotALookup`] when a chain passes
    /// through a non-reference, and port failures.
    pub fn resolve(&mut self, path: &FieldPath, suppress: bool) -> Result<Option<String>, NumberingError> {
        let key = path.cache_key();
        if let Some(value) = self.memo.get(&key) {
            return Ok(value.clone());
        }

        match self.lookup(path)? {
            Lookup::Found(value) => {
                debug!(field = %key, value = ?value, "resolved field");
                self.memo.insert(key, value.clone());
                Ok(value)
            }
            Lookup::Missing { .. } if suppress => Ok(None),
            Lookup::Missing { entity, field } => Err(NumberingError::FieldMissing { entity, field }),
        }
    }

    fn lookup(&self, path: &FieldPath) -> Result<Lookup, NumberingError> {
        let mut fetched: Option<Record> = None;
        let last = path.chain.len() - 1;

        for (depth, name) in path.chain.iter().enumerate() {
            let record = fetched.as_ref().unwrap_or(&self.record);
            let Some(value) = record.get(name) else {
                return Ok(Lookup::Missing { entity: record.entity.clone(), field: name.clone() });
            };

            if depth == last {
                return self.render(record, name, value, path.format.as_deref()).map(Lookup::Found);
            }

            let target = match value {
                Value::Reference(target) => target,
                Value::Null => return Ok(Lookup::Found(None)),
                _ => return Err(NumberingError::NotALookup(name.clone())),
            };
            let next = path.chain[depth + 1].as_str();
            let record = self
                .sources
                .records
                .get(&target.entity, &target.id, Some(&[next]))
                .port("record store")?;
            fetched = Some(record);
        }
        unreachable!("field chains are never empty")
    }

    fn render(
        &self,
        record: &Record,
        name: &str,
        value: &Value,
        format: Option<&str>,
    ) -> Result<Option<String>, NumberingError> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::Text(text) => text.clone(),
            Value::OptionSet(option) => match record.formatted.get(name) {
                Some(label) => label.clone(),
                None => self.option_label(&record.entity, name, *option)?,
            },
            Value::DateTime(at) => {
                let local = at.with_timezone(&self.sources.zone);
                match format {
                    Some(pattern) => format_date(&local, pattern),
                    None => local.format(DEFAULT_DATE_FORMAT).to_string(),
                }
            }
            Value::Reference(target) => return self.reference_name(target),
            other => other.to_string(),
        };
        Ok(Some(text))
    }

    fn option_label(&self, entity: &str, attribute: &str, option: i32) -> Result<String, NumberingError> {
        let s = &self.sources;
        let label = s.cache.option_label(s.metadata, s.clock, s.organization, entity, attribute, option)?;
        Ok(label.unwrap_or_else(|| option.to_string()))
    }

    fn reference_name(&self, target: &EntityRef) -> Result<Option<String>, NumberingError> {
        if let Some(name) = &target.name {
            return Ok(Some(name.clone()));
        }
        let s = &self.sources;
        let attribute = s.cache.primary_name_attribute(s.metadata, s.clock, s.organization, &target.entity)?;
        let record = s
            .records
            .get(&target.entity, &target.id, Some(&[attribute.as_str()]))
            .port("record store")?;
        Ok(record.get(&attribute).filter(|v| **v != Value::Null).map(ToString::to_string))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::adapters::memory::{FixedClock, MemoryRecordStore, StaticMetadata};
    use crate::template::parse;

    struct Fixture {
        records: MemoryRecordStore,
        metadata: StaticMetadata,
        cache: MetadataCache,
        clock: FixedClock,
    }

    impl Fixture {
        fn new() -> Self {
            let records = MemoryRecordStore::new()
                .with(
                    Record::new("contact", "p1")
                        .with("fullname", "Nadia Salem")
                        .with(
                            "parentcustomerid",
                            Value::Reference(EntityRef { entity: "account".into(), id: "a1".into(), name: None }),
                        ),
                )
                .with(Record::new("account", "a1").with("name", "Contoso").with("accountnumber", "AC-9"));
            let metadata = StaticMetadata::new()
                .with_label("case", "priority", 1, "High")
                .with_primary_name("contact", "fullname");
            Self { records, metadata, cache: MetadataCache::new(), clock: FixedClock::at("2025-01-01T00:00:00Z") }
        }

        fn resolver(&self, record: Record) -> FieldResolver<'_> {
            let sources = FieldSources {
                records: &self.records,
                metadata: &self.metadata,
                cache: &self.cache,
                clock: &self.clock,
                organization: "org",
                zone: chrono_tz::Asia::Tokyo,
            };
            FieldResolver::new(sources, record)
        }
    }

    fn path(source: &str) -> FieldPath {
        let template = parse(source).unwrap();
        let path = match &template.directives().next().unwrap().kind {
            crate::template::DirectiveKind::Field(path) => path.clone(),
            other => panic!("expected field, got {other:?}"),
        };
        path
    }

    fn case() -> Record {
        let opened: DateTime<Utc> = "2025-01-31T20:00:00Z".parse().unwrap();
        Record::new("case", "c1")
            .with("title", "Broken pump")
            .with("priority", Value::OptionSet(1))
            .with("severity", Value::OptionSet(4))
            .with("opened", Value::DateTime(opened))
            .with("notes", Value::Null)
            .with("count", Value::Integer(3))
            .with(
                "customerid",
                Value::Reference(EntityRef { entity: "contact".into(), id: "p1".into(), name: None }),
            )
    }

    #[test]
    fn plain_values() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        assert_eq!(resolver.resolve(&path("{$title}"), false).unwrap().as_deref(), Some("Broken pump"));
        assert_eq!(resolver.resolve(&path("{$count}"), false).unwrap().as_deref(), Some("3"));
        assert_eq!(resolver.resolve(&path("{$notes}"), false).unwrap(), None);
    }

    #[test]
    fn option_set_uses_formatted_label_then_metadata() {
        let fixture = Fixture::new();
        let mut record = case();
        record.formatted.insert("severity".into(), "Critical".into());
        let mut resolver = fixture.resolver(record);

        assert_eq!(resolver.resolve(&path("{$priority}"), false).unwrap().as_deref(), Some("High"));
        assert_eq!(resolver.resolve(&path("{$severity}"), false).unwrap().as_deref(), Some("Critical"));
        assert_eq!(fixture.metadata.lookups(), 1);
    }

    #[test]
    fn dates_render_in_owner_zone() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        assert_eq!(
            resolver.resolve(&path("{$opened@yyyy-MM-dd}"), false).unwrap().as_deref(),
            Some("2025-02-01")
        );
        assert_eq!(
            resolver.resolve(&path("{$opened}"), false).unwrap().as_deref(),
            Some("2025-02-01 05:00:00")
        );
    }

    #[test]
    fn reference_resolves_primary_name() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        assert_eq!(resolver.resolve(&path("{$customerid}"), false).unwrap().as_deref(), Some("Nadia Salem"));
    }

    #[test]
    fn two_hop_lookup() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        let value = resolver.resolve(&path("{$customerid$parentcustomerid$accountnumber}"), false).unwrap();
        assert_eq!(value.as_deref(), Some("AC-9"));
    }

    #[test]
    fn missing_intermediate_is_field_missing() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        let err = resolver.resolve(&path("{$customerid$managerid$name}"), false).unwrap_err();
        match err {
            NumberingError::FieldMissing { entity, field } => {
                assert_eq!(entity, "contact");
                assert_eq!(field, "managerid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_reference_intermediate_is_not_a_lookup() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        assert!(matches!(
            resolver.resolve(&path("{$title$name}"), false),
            Err(NumberingError::NotALookup(field)) if field == "title"
        ));
    }

    #[test]
    fn suppressed_missing_field_is_none() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        assert_eq!(resolver.resolve(&path("{$zip}"), true).unwrap(), None);
        assert!(resolver.resolve(&path("{$zip}"), false).is_err());
    }

    #[test]
    fn resolved_values_are_memoized() {
        let fixture = Fixture::new();
        let mut resolver = fixture.resolver(case());
        resolver.resolve(&path("{$priority}"), false).unwrap();
        fixture.clock.advance(chrono::Duration::hours(crate::metadata::METADATA_TTL_HOURS + 1));
        resolver.resolve(&path("{$priority}"), false).unwrap();
        assert_eq!(fixture.metadata.lookups(), 1);
    }
}
