//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::Arc;

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::id_gen::UuidIdGenerator;
use crate::adapters::memory::{
    FixedClock, MemoryConfigStore, MemoryRecordStore, StaticMetadata, StaticTimeZones,
};
use crate::metadata::MetadataCache;
use crate::model::NumberingConfig;
use crate::ports::{Clock, ConfigStore, IdGenerator, MetadataSource, PortError, RecordStore, TimeZones};
use crate::store::FileStore;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Ports are shared
/// behind `Arc` because one adapter (the file store) serves several of
/// them.
pub struct ServiceContext {
    /// Current time.
    pub clock: Arc<dyn Clock>,
    /// Owner time zones.
    pub time_zones: Arc<dyn TimeZones>,
    /// Records being numbered.
    pub records: Arc<dyn RecordStore>,
    /// Configs, streams and back-log entries.
    pub configs: Arc<dyn ConfigStore>,
    /// Option labels and primary names.
    pub metadata: Arc<dyn MetadataSource>,
    /// Ids for locking tokens and new rows.
    pub id_gen: Arc<dyn IdGenerator>,
    /// Per-organization metadata cache, kept for the life of the context.
    pub metadata_cache: MetadataCache,
}

impl ServiceContext {
    /// Creates a live context over a YAML store rooted at `root`.
    #[must_use]
    pub fn live(root: &Path) -> Self {
        let id_gen: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
        let store = Arc::new(FileStore::new(root, Arc::new(LiveFileSystem), id_gen.clone()));
        Self {
            clock: Arc::new(LiveClock),
            time_zones: store.clone(),
            records: store.clone(),
            configs: store.clone(),
            metadata: store,
            id_gen,
            metadata_cache: MetadataCache::new(),
        }
    }

    /// Creates a context over empty in-memory stores with a pinned clock.
    #[must_use]
    pub fn in_memory(clock: FixedClock) -> Self {
        Self {
            clock: Arc::new(clock),
            time_zones: Arc::new(StaticTimeZones::default()),
            records: Arc::new(MemoryRecordStore::new()),
            configs: Arc::new(MemoryConfigStore::new()),
            metadata: Arc::new(StaticMetadata::new()),
            id_gen: Arc::new(UuidIdGenerator),
            metadata_cache: MetadataCache::new(),
        }
    }

    /// A throwaway copy for dry runs. The config and its streams are
    /// copied into memory so counter writes stay local; records, time and
    /// metadata still come from `self`, so callers must write results in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns an error if the config's streams cannot be listed.
    pub fn sandbox(&self, config: NumberingConfig) -> Result<Self, PortError> {
        let configs = MemoryConfigStore::new();
        if !config.is_inline() {
            for stream in self.configs.list_streams(&config.id)? {
                configs.create_stream(&stream)?;
            }
            configs.insert(config);
        }
        Ok(Self {
            clock: self.clock.clone(),
            time_zones: self.time_zones.clone(),
            records: self.records.clone(),
            configs: Arc::new(configs),
            metadata: self.metadata.clone(),
            id_gen: self.id_gen.clone(),
            metadata_cache: MetadataCache::new(),
        })
    }
}
