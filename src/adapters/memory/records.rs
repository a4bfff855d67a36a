//! In-memory record store with scriptable collisions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::model::{Condition, Record, Value};
use crate::ports::{PortError, RecordStore};

/// Record store holding records in a map keyed by `(entity, id)`.
///
/// `collide_next(n)` makes the next `n` uniqueness queries report an
/// existing match regardless of the stored data.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<(String, String), Record>>,
    forced_collisions: AtomicUsize,
    always_collide: AtomicBool,
    uniqueness_queries: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&self, record: Record) {
        self.records
            .lock()
            .expect("record store lock poisoned")
            .insert((record.entity.clone(), record.id.clone()), record);
    }

    /// Builder-style [`MemoryRecordStore::insert`].
    #[must_use]
    pub fn with(self, record: Record) -> Self {
        self.insert(record);
        self
    }

    /// Reports a collision for the next `n` uniqueness queries.
    pub fn collide_next(&self, n: usize) {
        self.forced_collisions.store(n, Ordering::SeqCst);
    }

    /// Reports a collision for every uniqueness query.
    pub fn collide_always(&self) {
        self.always_collide.store(true, Ordering::SeqCst);
    }

    /// Number of uniqueness queries served.
    #[must_use]
    pub fn uniqueness_queries(&self) -> usize {
        self.uniqueness_queries.load(Ordering::SeqCst)
    }

    /// Number of `update` calls served.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Returns a stored record.
    #[must_use]
    pub fn record(&self, entity: &str, id: &str) -> Option<Record> {
        self.records
            .lock()
            .expect("record store lock poisoned")
            .get(&(entity.to_string(), id.to_string()))
            .cloned()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, entity: &str, id: &str, columns: Option<&[&str]>) -> Result<Record, PortError> {
        let records = self.records.lock().map_err(|e| e.to_string())?;
        let record = records
            .get(&(entity.to_string(), id.to_string()))
            .ok_or_else(|| format!("record {entity}/{id} not found"))?;

        let Some(columns) = columns else {
            return Ok(record.clone());
        };
        let mut limited = Record::new(&record.entity, &record.id);
        for column in columns {
            if let Some(value) = record.fields.get(*column) {
                limited.fields.insert((*column).to_string(), value.clone());
            }
            if let Some(label) = record.formatted.get(*column) {
                limited.formatted.insert((*column).to_string(), label.clone());
            }
        }
        Ok(limited)
    }

    fn update(
        &self,
        entity: &str,
        id: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<(), PortError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().map_err(|e| e.to_string())?;
        let record = records
            .get_mut(&(entity.to_string(), id.to_string()))
            .ok_or_else(|| format!("record {entity}/{id} not found"))?;
        record.fields.extend(fields);
        Ok(())
    }

    fn exists_with_value(&self, entity: &str, field: &str, value: &str) -> Result<bool, PortError> {
        self.uniqueness_queries.fetch_add(1, Ordering::SeqCst);

        if self.always_collide.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let forced = self
            .forced_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Ok(true);
        }

        let records = self.records.lock().map_err(|e| e.to_string())?;
        Ok(records
            .values()
            .filter(|r| r.entity == entity)
            .any(|r| r.get(field).and_then(Value::as_text) == Some(value)))
    }

    fn matches_condition(&self, entity: &str, id: &str, condition: &str) -> Result<bool, PortError> {
        let condition = Condition::parse(condition)?;
        let record = self.get(entity, id, None)?;
        Ok(condition.matches(&record))
    }
}
