//! Configuration store port: configs, stream counters and back-log rows.

use chrono::{DateTime, Utc};

use super::PortError;
use crate::model::{BacklogEntry, ConfigPatch, NumberingConfig, Stream};

/// Persists numbering configs and their counters.
///
/// Counter state is read fresh for every generation; nothing here is
/// cached by the engine.
pub trait ConfigStore: Send + Sync {
    /// Loads a config by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_config(&self, id: &str) -> Result<Option<NumberingConfig>, PortError>;

    /// Finds an active config by id or name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_config(&self, id_or_name: &str) -> Result<Option<NumberingConfig>, PortError>;

    /// Applies a counter patch to a config row.
    ///
    /// # Errors
    ///
    /// Returns an error if the config does not exist or the write fails.
    fn save_config(&self, id: &str, patch: &ConfigPatch) -> Result<(), PortError>;

    /// Loads the stream with the given identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_stream(
        &self,
        config_id: &str,
        field_name: &str,
        field_value: Option<&str>,
    ) -> Result<Option<Stream>, PortError>;

    /// Creates a stream row and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn create_stream(&self, stream: &Stream) -> Result<String, PortError>;

    /// Saves a stream's counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream does not exist or the write fails.
    fn save_stream(&self, stream: &Stream) -> Result<(), PortError>;

    /// Lists every stream of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_streams(&self, config_id: &str) -> Result<Vec<Stream>, PortError>;

    /// Lowest-index back-log entry of a config last modified before `older_than`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_stale_backlog(
        &self,
        config_id: &str,
        older_than: DateTime<Utc>,
    ) -> Result<Option<BacklogEntry>, PortError>;

    /// Inserts or replaces the entry keyed by its trigger id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_backlog(&self, entry: &BacklogEntry) -> Result<(), PortError>;

    /// Removes and returns the entry for a trigger id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn take_backlog(&self, trigger_id: &str) -> Result<Option<BacklogEntry>, PortError>;
}
