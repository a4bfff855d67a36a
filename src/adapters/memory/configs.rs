//! In-memory configuration store that counts its writes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::model::{BacklogEntry, ConfigPatch, ConfigStatus, NumberingConfig, Stream};
use crate::ports::{ConfigStore, PortError};

#[derive(Default)]
struct State {
    configs: BTreeMap<String, NumberingConfig>,
    streams: Vec<Stream>,
    backlog: Vec<BacklogEntry>,
}

/// Configuration store kept in memory behind a single lock.
///
/// Every write goes through the same mutex, so concurrent generations
/// against one store see serialized counter updates.
#[derive(Default)]
pub struct MemoryConfigStore {
    state: Mutex<State>,
    config_saves: AtomicUsize,
    stream_creates: AtomicUsize,
    stream_saves: AtomicUsize,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a config.
    pub fn insert(&self, config: NumberingConfig) {
        self.lock().configs.insert(config.id.clone(), config);
    }

    /// Builder-style [`MemoryConfigStore::insert`].
    #[must_use]
    pub fn with(self, config: NumberingConfig) -> Self {
        self.insert(config);
        self
    }

    /// Snapshot of a config.
    #[must_use]
    pub fn config(&self, id: &str) -> Option<NumberingConfig> {
        self.lock().configs.get(id).cloned()
    }

    /// Snapshot of a config's back-log entries.
    #[must_use]
    pub fn backlog(&self, config_id: &str) -> Vec<BacklogEntry> {
        self.lock().backlog.iter().filter(|e| e.config_id == config_id).cloned().collect()
    }

    /// Number of `save_config` calls.
    #[must_use]
    pub fn config_saves(&self) -> usize {
        self.config_saves.load(Ordering::SeqCst)
    }

    /// Number of `create_stream` calls.
    #[must_use]
    pub fn stream_creates(&self) -> usize {
        self.stream_creates.load(Ordering::SeqCst)
    }

    /// Number of `save_stream` calls.
    #[must_use]
    pub fn stream_saves(&self) -> usize {
        self.stream_saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("config store lock poisoned")
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, State>, PortError> {
        self.state.lock().map_err(|e| e.to_string().into())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load_config(&self, id: &str) -> Result<Option<NumberingConfig>, PortError> {
        Ok(self.try_lock()?.configs.get(id).cloned())
    }

    fn find_config(&self, id_or_name: &str) -> Result<Option<NumberingConfig>, PortError> {
        Ok(self
            .try_lock()?
            .configs
            .values()
            .find(|c| {
                (c.id == id_or_name || c.name == id_or_name) && c.status == ConfigStatus::Active
            })
            .cloned())
    }

    fn save_config(&self, id: &str, patch: &ConfigPatch) -> Result<(), PortError> {
        self.config_saves.fetch_add(1, Ordering::SeqCst);
        let mut state = self.try_lock()?;
        let config = state.configs.get_mut(id).ok_or_else(|| format!("config {id} not found"))?;
        patch.apply_to(config);
        Ok(())
    }

    fn load_stream(
        &self,
        config_id: &str,
        field_name: &str,
        field_value: Option<&str>,
    ) -> Result<Option<Stream>, PortError> {
        Ok(self
            .try_lock()?
            .streams
            .iter()
            .find(|s| s.is_keyed(config_id, field_name, field_value))
            .cloned())
    }

    fn create_stream(&self, stream: &Stream) -> Result<String, PortError> {
        self.stream_creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.try_lock()?;
        let key = (stream.config_id.as_str(), stream.field_name.as_str(), stream.field_value.as_deref());
        if state.streams.iter().any(|s| s.is_keyed(key.0, key.1, key.2)) {
            return Err(format!("stream {}:{:?} already exists", stream.field_name, stream.field_value).into());
        }
        let id = format!("stream-{}", state.streams.len() + 1);
        state.streams.push(Stream { id: id.clone(), ..stream.clone() });
        Ok(id)
    }

    fn save_stream(&self, stream: &Stream) -> Result<(), PortError> {
        self.stream_saves.fetch_add(1, Ordering::SeqCst);
        let mut state = self.try_lock()?;
        let stored = state
            .streams
            .iter_mut()
            .find(|s| s.id == stream.id)
            .ok_or_else(|| format!("stream {} not found", stream.id))?;
        stored.current_index = stream.current_index;
        Ok(())
    }

    fn list_streams(&self, config_id: &str) -> Result<Vec<Stream>, PortError> {
        Ok(self.try_lock()?.streams.iter().filter(|s| s.config_id == config_id).cloned().collect())
    }

    fn find_stale_backlog(
        &self,
        config_id: &str,
        older_than: DateTime<Utc>,
    ) -> Result<Option<BacklogEntry>, PortError> {
        Ok(self
            .try_lock()?
            .backlog
            .iter()
            .filter(|e| e.config_id == config_id && e.modified_on < older_than)
            .min_by_key(|e| e.index)
            .cloned())
    }

    fn upsert_backlog(&self, entry: &BacklogEntry) -> Result<(), PortError> {
        let mut state = self.try_lock()?;
        state.backlog.retain(|e| e.trigger_id != entry.trigger_id && (entry.id.is_empty() || e.id != entry.id));
        let mut entry = entry.clone();
        if entry.id.is_empty() {
            entry.id = format!("backlog-{}", entry.trigger_id);
        }
        state.backlog.push(entry);
        Ok(())
    }

    fn take_backlog(&self, trigger_id: &str) -> Result<Option<BacklogEntry>, PortError> {
        let mut state = self.try_lock()?;
        let position = state.backlog.iter().position(|e| e.trigger_id == trigger_id);
        Ok(position.map(|i| state.backlog.remove(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NumberingConfig {
        NumberingConfig {
            id: "inv".into(),
            name: "Invoices".into(),
            current_index: Some(3),
            ..NumberingConfig::default()
        }
    }

    #[test]
    fn finds_active_config_by_name() {
        let store = MemoryConfigStore::new().with(config());
        assert!(store.find_config("Invoices").unwrap().is_some());

        store.insert(NumberingConfig { status: ConfigStatus::Inactive, ..config() });
        assert!(store.find_config("inv").unwrap().is_none());
    }

    #[test]
    fn save_config_applies_patch_and_counts() {
        let store = MemoryConfigStore::new().with(config());
        store.save_config("inv", &ConfigPatch { current_index: Some(4), ..ConfigPatch::default() }).unwrap();
        assert_eq!(store.config("inv").unwrap().current_index, Some(4));
        assert_eq!(store.config_saves(), 1);
    }

    #[test]
    fn duplicate_stream_identity_is_rejected() {
        let store = MemoryConfigStore::new();
        let stream = Stream::new("inv", "region", Some("EU"));
        store.create_stream(&stream).unwrap();
        assert!(store.create_stream(&stream).is_err());
        assert!(store.create_stream(&Stream::new("inv", "region", None)).is_ok());
    }

    #[test]
    fn upsert_replaces_by_trigger_id() {
        let store = MemoryConfigStore::new();
        let now = Utc::now();
        let entry = BacklogEntry {
            id: String::new(),
            trigger_id: "t1".into(),
            config_id: "inv".into(),
            index: 5,
            modified_on: now,
        };
        store.upsert_backlog(&entry).unwrap();
        store.upsert_backlog(&BacklogEntry { index: 6, ..entry }).unwrap();

        let entries = store.backlog("inv");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 6);
        assert!(store.take_backlog("t1").unwrap().is_some());
        assert!(store.take_backlog("t1").unwrap().is_none());
    }
}
