//! YAML store: records, configs, counters and metadata under one root.
//!
//! Every read and write goes through the `FileSystem` port. Directory
//! layout:
//!
//! ```text
//! <root>/
//!   ├── configs/<id>.yaml
//!   ├── streams/<config id>.yaml
//!   ├── records/<entity>/<id>.yaml
//!   ├── backlog.yaml
//!   ├── metadata.yaml
//!   └── owners.yaml
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{BacklogEntry, Condition, ConfigPatch, ConfigStatus, NumberingConfig, Record, Stream, Value};
use crate::ports::metadata::DEFAULT_PRIMARY_NAME;
use crate::ports::{
    ConfigStore, FileSystem, IdGenerator, MetadataSource, PortError, RecordStore, TimeZones,
};

const YAML: &str = ".yaml";

/// One option-set label in `metadata.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLabel {
    /// Entity name.
    pub entity: String,
    /// Attribute name.
    pub attribute: String,
    /// Numeric option value.
    pub value: i32,
    /// Display label.
    pub label: String,
}

/// Contents of `metadata.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    /// Option-set labels.
    #[serde(default)]
    pub labels: Vec<OptionLabel>,
    /// Primary-name attribute per entity.
    #[serde(default)]
    pub primary_names: BTreeMap<String, String>,
}

/// Contents of `owners.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnersFile {
    /// Zone for owners not listed; UTC when unset.
    #[serde(default)]
    pub default_zone: Option<String>,
    /// IANA zone name per owner.
    #[serde(default)]
    pub zones: BTreeMap<String, String>,
}

/// File-backed implementation of the record, config, metadata and
/// time-zone ports.
///
/// Read-modify-write cycles hold a store-wide lock, so two generations
/// in one process never interleave counter updates.
pub struct FileStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    ids: Arc<dyn IdGenerator>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: &Path, fs: Arc<dyn FileSystem>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { root: root.to_path_buf(), fs, ids, write_lock: Mutex::new(()) }
    }

    /// Writes a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the config has no id, the id is not a plain
    /// file name, or the write fails.
    pub fn put_config(&self, config: &NumberingConfig) -> Result<(), PortError> {
        if config.is_inline() {
            return Err("inline configs cannot be stored".into());
        }
        self.write_yaml(&self.config_path(&config.id)?, config)
    }

    /// Lists stored configs, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed.
    pub fn list_configs(&self) -> Result<Vec<NumberingConfig>, PortError> {
        let dir = self.root.join("configs");
        let mut configs = Vec::new();
        for name in self.yaml_names(&dir)? {
            configs.push(self.read_yaml(&dir.join(format!("{name}{YAML}")))?);
        }
        Ok(configs)
    }

    /// Writes a record document.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity or id is not a plain file name, or
    /// the write fails.
    pub fn put_record(&self, record: &Record) -> Result<(), PortError> {
        self.write_yaml(&self.record_path(&record.entity, &record.id)?, record)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn config_path(&self, id: &str) -> Result<PathBuf, PortError> {
        Ok(self.root.join("configs").join(format!("{}{YAML}", segment(id)?)))
    }

    fn streams_path(&self, config_id: &str) -> Result<PathBuf, PortError> {
        Ok(self.root.join("streams").join(format!("{}{YAML}", segment(config_id)?)))
    }

    fn record_path(&self, entity: &str, id: &str) -> Result<PathBuf, PortError> {
        Ok(self.root.join("records").join(segment(entity)?).join(format!("{}{YAML}", segment(id)?)))
    }

    fn backlog_path(&self) -> PathBuf {
        self.root.join(format!("backlog{YAML}"))
    }

    fn read_yaml<T: DeserializeOwned>(&self, path: &Path) -> Result<T, PortError> {
        let contents = self.fs.read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| format!("parse {}: {e}", path.display()).into())
    }

    /// Reads a document, or the type's default when the file is absent.
    fn read_yaml_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, PortError> {
        if self.fs.exists(path) {
            self.read_yaml(path)
        } else {
            Ok(T::default())
        }
    }

    fn write_yaml<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), PortError> {
        let yaml = serde_yaml::to_string(value)?;
        self.fs.write(path, &yaml)
    }

    /// File stems of the `.yaml` files in `dir`.
    fn yaml_names(&self, dir: &Path) -> Result<Vec<String>, PortError> {
        if !self.fs.exists(dir) {
            return Ok(Vec::new());
        }
        Ok(self
            .fs
            .list_dir(dir)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(YAML).map(String::from))
            .collect())
    }

    fn load_streams(&self, config_id: &str) -> Result<Vec<Stream>, PortError> {
        self.read_yaml_or_default(&self.streams_path(config_id)?)
    }

    fn load_backlog(&self) -> Result<Vec<BacklogEntry>, PortError> {
        self.read_yaml_or_default(&self.backlog_path())
    }

    fn metadata_file(&self) -> Result<MetadataFile, PortError> {
        self.read_yaml_or_default(&self.root.join(format!("metadata{YAML}")))
    }
}

/// Ids and entity names become file names; anything that could leave
/// its directory is refused.
fn is_segment(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains(['/', '\\', '\0'])
}

fn segment(name: &str) -> Result<&str, PortError> {
    if is_segment(name) {
        Ok(name)
    } else {
        Err(format!("'{name}' is not a valid store name").into())
    }
}

impl RecordStore for FileStore {
    fn get(&self, entity: &str, id: &str, columns: Option<&[&str]>) -> Result<Record, PortError> {
        let path = self.record_path(entity, id)?;
        if !self.fs.exists(&path) {
            return Err(format!("record {entity}/{id} not found").into());
        }
        let mut record: Record = self.read_yaml(&path)?;
        if let Some(columns) = columns {
            record.fields.retain(|name, _| columns.contains(&name.as_str()));
            record.formatted.retain(|name, _| columns.contains(&name.as_str()));
        }
        Ok(record)
    }

    fn update(&self, entity: &str, id: &str, fields: BTreeMap<String, Value>) -> Result<(), PortError> {
        let _guard = self.lock();
        let mut record = self.get(entity, id, None)?;
        record.fields.extend(fields);
        self.put_record(&record)
    }

    fn exists_with_value(&self, entity: &str, field: &str, value: &str) -> Result<bool, PortError> {
        let dir = self.root.join("records").join(segment(entity)?);
        for id in self.yaml_names(&dir)? {
            let record = self.get(entity, &id, Some(&[field]))?;
            if record.get(field).and_then(Value::as_text) == Some(value) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_condition(&self, entity: &str, id: &str, condition: &str) -> Result<bool, PortError> {
        let condition = Condition::parse(condition)?;
        Ok(condition.matches(&self.get(entity, id, None)?))
    }
}

impl ConfigStore for FileStore {
    fn load_config(&self, id: &str) -> Result<Option<NumberingConfig>, PortError> {
        let path = self.config_path(id)?;
        if self.fs.exists(&path) {
            self.read_yaml(&path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn find_config(&self, id_or_name: &str) -> Result<Option<NumberingConfig>, PortError> {
        let by_id = if is_segment(id_or_name) { self.load_config(id_or_name)? } else { None };
        let found = match by_id {
            Some(config) => Some(config),
            None => self.list_configs()?.into_iter().find(|c| c.name == id_or_name),
        };
        Ok(found.filter(|c| c.status == ConfigStatus::Active))
    }

    fn save_config(&self, id: &str, patch: &ConfigPatch) -> Result<(), PortError> {
        let _guard = self.lock();
        let mut config = self.load_config(id)?.ok_or_else(|| format!("config {id} not found"))?;
        patch.apply_to(&mut config);
        self.put_config(&config)
    }

    fn load_stream(
        &self,
        config_id: &str,
        field_name: &str,
        field_value: Option<&str>,
    ) -> Result<Option<Stream>, PortError> {
        Ok(self
            .load_streams(config_id)?
            .into_iter()
            .find(|s| s.is_keyed(config_id, field_name, field_value)))
    }

    fn create_stream(&self, stream: &Stream) -> Result<String, PortError> {
        let _guard = self.lock();
        let mut streams = self.load_streams(&stream.config_id)?;
        if streams.iter().any(|s| s.is_keyed(&stream.config_id, &stream.field_name, stream.field_value.as_deref())) {
            return Err(format!("stream {}:{:?} already exists", stream.field_name, stream.field_value).into());
        }
        let id = self.ids.generate_id();
        streams.push(Stream { id: id.clone(), ..stream.clone() });
        self.write_yaml(&self.streams_path(&stream.config_id)?, &streams)?;
        Ok(id)
    }

    fn save_stream(&self, stream: &Stream) -> Result<(), PortError> {
        let _guard = self.lock();
        let mut streams = self.load_streams(&stream.config_id)?;
        let stored = streams
            .iter_mut()
            .find(|s| s.id == stream.id)
            .ok_or_else(|| format!("stream {} not found", stream.id))?;
        stored.current_index = stream.current_index;
        self.write_yaml(&self.streams_path(&stream.config_id)?, &streams)
    }

    fn list_streams(&self, config_id: &str) -> Result<Vec<Stream>, PortError> {
        self.load_streams(config_id)
    }

    fn find_stale_backlog(
        &self,
        config_id: &str,
        older_than: DateTime<Utc>,
    ) -> Result<Option<BacklogEntry>, PortError> {
        Ok(self
            .load_backlog()?
            .into_iter()
            .filter(|e| e.config_id == config_id && e.modified_on < older_than)
            .min_by_key(|e| e.index))
    }

    fn upsert_backlog(&self, entry: &BacklogEntry) -> Result<(), PortError> {
        let _guard = self.lock();
        let mut entries = self.load_backlog()?;
        entries.retain(|e| e.trigger_id != entry.trigger_id && (entry.id.is_empty() || e.id != entry.id));
        let mut entry = entry.clone();
        if entry.id.is_empty() {
            entry.id = self.ids.generate_id();
        }
        entries.push(entry);
        self.write_yaml(&self.backlog_path(), &entries)
    }

    fn take_backlog(&self, trigger_id: &str) -> Result<Option<BacklogEntry>, PortError> {
        let _guard = self.lock();
        let mut entries = self.load_backlog()?;
        let Some(position) = entries.iter().position(|e| e.trigger_id == trigger_id) else {
            return Ok(None);
        };
        let entry = entries.remove(position);
        self.write_yaml(&self.backlog_path(), &entries)?;
        Ok(Some(entry))
    }
}

impl MetadataSource for FileStore {
    fn option_label(&self, entity: &str, attribute: &str, value: i32) -> Result<Option<String>, PortError> {
        Ok(self
            .metadata_file()?
            .labels
            .into_iter()
            .find(|l| l.entity == entity && l.attribute == attribute && l.value == value)
            .map(|l| l.label))
    }

    fn primary_name_attribute(&self, entity: &str) -> Result<String, PortError> {
        Ok(self
            .metadata_file()?
            .primary_names
            .remove(entity)
            .unwrap_or_else(|| DEFAULT_PRIMARY_NAME.to_string()))
    }
}

impl TimeZones for FileStore {
    fn zone_for(&self, owner: &str) -> Result<Tz, PortError> {
        let owners: OwnersFile = self.read_yaml_or_default(&self.root.join(format!("owners{YAML}")))?;
        let Some(name) = owners.zones.get(owner).or(owners.default_zone.as_ref()) else {
            return Ok(Tz::UTC);
        };
        name.parse::<Tz>().map_err(|_| format!("unknown time zone '{name}' for owner '{owner}'").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryFileSystem, SequentialIdGenerator};

    fn store(fs: MemoryFileSystem) -> FileStore {
        FileStore::new(Path::new("/store"), Arc::new(fs), Arc::new(SequentialIdGenerator::new("id")))
    }

    fn config() -> NumberingConfig {
        NumberingConfig {
            id: "inv".into(),
            name: "Invoices".into(),
            format: Some("INV-{sequence}".into()),
            current_index: Some(4),
            ..NumberingConfig::default()
        }
    }

    #[test]
    fn configs_round_trip_and_patch() {
        let store = store(MemoryFileSystem::new());
        store.put_config(&config()).unwrap();

        assert_eq!(store.find_config("Invoices").unwrap().map(|c| c.id), Some("inv".into()));
        store.save_config("inv", &ConfigPatch { current_index: Some(5), ..ConfigPatch::default() }).unwrap();
        assert_eq!(store.load_config("inv").unwrap().unwrap().current_index, Some(5));
        assert!(store.save_config("missing", &ConfigPatch::default()).is_err());
    }

    #[test]
    fn inactive_configs_are_not_found() {
        let store = store(MemoryFileSystem::new());
        store.put_config(&NumberingConfig { status: ConfigStatus::Inactive, ..config() }).unwrap();
        assert!(store.find_config("inv").unwrap().is_none());
        assert!(store.load_config("inv").unwrap().is_some());
    }

    #[test]
    fn streams_get_ids_and_reject_duplicates() {
        let store = store(MemoryFileSystem::new());
        let stream = Stream::new("inv", "region", Some("EU"));
        let id = store.create_stream(&stream).unwrap();
        assert_eq!(id, "id-1");
        assert!(store.create_stream(&stream).is_err());

        let mut saved = store.load_stream("inv", "region", Some("EU")).unwrap().unwrap();
        saved.current_index = 9;
        store.save_stream(&saved).unwrap();
        assert_eq!(store.list_streams("inv").unwrap()[0].current_index, 9);
        assert!(store.load_stream("inv", "region", None).unwrap().is_none());
    }

    #[test]
    fn records_limit_columns_and_answer_uniqueness() {
        let store = store(MemoryFileSystem::new());
        store.put_record(&Record::new("invoice", "i1").with("number", "INV-1").with("total", Value::Integer(5))).unwrap();

        let limited = store.get("invoice", "i1", Some(&["number"])).unwrap();
        assert_eq!(limited.fields.len(), 1);
        assert!(store.exists_with_value("invoice", "number", "INV-1").unwrap());
        assert!(!store.exists_with_value("invoice", "number", "INV-2").unwrap());
        assert!(!store.exists_with_value("order", "number", "INV-1").unwrap());

        store.update("invoice", "i1", BTreeMap::from([("number".to_string(), Value::from("INV-2"))])).unwrap();
        assert!(store.exists_with_value("invoice", "number", "INV-2").unwrap());
        assert!(store.matches_condition("invoice", "i1", "number=INV-2; total").unwrap());
    }

    #[test]
    fn backlog_upsert_take_and_stale_lookup() {
        let store = store(MemoryFileSystem::new());
        let old: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        let entry = |trigger: &str, index| BacklogEntry {
            id: String::new(),
            trigger_id: trigger.into(),
            config_id: "inv".into(),
            index,
            modified_on: old,
        };
        store.upsert_backlog(&entry("t1", 7)).unwrap();
        store.upsert_backlog(&entry("t2", 3)).unwrap();

        let stale = store.find_stale_backlog("inv", old + chrono::Duration::minutes(1)).unwrap().unwrap();
        assert_eq!(stale.trigger_id, "t2");
        assert!(store.find_stale_backlog("inv", old).unwrap().is_none());

        assert_eq!(store.take_backlog("t1").unwrap().map(|e| e.index), Some(7));
        assert!(store.take_backlog("t1").unwrap().is_none());
    }

    #[test]
    fn metadata_and_zones_from_files() {
        let fs = MemoryFileSystem::new()
            .with_file(
                "/store/metadata.yaml",
                "labels:\n  - {entity: case, attribute: priority, value: 1, label: High}\nprimary_names:\n  contact: fullname\n",
            )
            .with_file("/store/owners.yaml", "default_zone: Europe/Berlin\nzones:\n  u1: Africa/Cairo\n  u2: Mars/Olympus\n");
        let store = store(fs);

        assert_eq!(store.option_label("case", "priority", 1).unwrap().as_deref(), Some("High"));
        assert_eq!(store.option_label("case", "priority", 2).unwrap(), None);
        assert_eq!(store.primary_name_attribute("contact").unwrap(), "fullname");
        assert_eq!(store.primary_name_attribute("account").unwrap(), "name");

        assert_eq!(store.zone_for("u1").unwrap(), Tz::Africa__Cairo);
        assert_eq!(store.zone_for("nobody").unwrap(), Tz::Europe__Berlin);
        assert!(store.zone_for("u2").is_err());
    }

    #[test]
    fn names_that_leave_the_root_are_refused() {
        let store = store(MemoryFileSystem::new());

        assert!(store.put_config(&NumberingConfig { id: "../x".into(), ..config() }).is_err());
        assert!(store.put_record(&Record::new("invoice", "a/b")).is_err());
        assert!(store.get("../e", "x", None).is_err());
        assert!(store.exists_with_value("..", "number", "INV-1").is_err());
        assert!(store.create_stream(&Stream::new("..\\inv", "region", None)).is_err());
        assert!(store.find_config("../x").unwrap().is_none());
        assert!(store.list_configs().unwrap().is_empty());
    }

    #[test]
    fn missing_files_mean_empty_store() {
        let store = store(MemoryFileSystem::new());
        assert!(store.list_configs().unwrap().is_empty());
        assert!(store.list_streams("inv").unwrap().is_empty());
        assert_eq!(store.zone_for("anyone").unwrap(), Tz::UTC);
        assert!(store.get("invoice", "nope", None).is_err());
    }
}
