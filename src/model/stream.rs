//! Stream counters and back-log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An independently counted partition of a config's sequence.
///
/// Identity is `(config_id, field_name, field_value)`; a `None` value is
/// its own partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Row id, assigned on creation.
    #[serde(default)]
    pub id: String,
    /// Owning config.
    pub config_id: String,
    /// Partition key name.
    pub field_name: String,
    /// Partition key value.
    #[serde(default)]
    pub field_value: Option<String>,
    /// Current counter value.
    #[serde(default)]
    pub current_index: i64,
}

impl Stream {
    /// A fresh, unsaved stream starting at zero.
    #[must_use]
    pub fn new(config_id: &str, field_name: &str, field_value: Option<&str>) -> Self {
        Self {
            id: String::new(),
            config_id: config_id.to_string(),
            field_name: field_name.to_string(),
            field_value: field_value.map(str::to_string),
            current_index: 0,
        }
    }

    /// Returns `true` when this stream has the given identity.
    #[must_use]
    pub fn is_keyed(&self, config_id: &str, field_name: &str, field_value: Option<&str>) -> bool {
        self.config_id == config_id
            && self.field_name == field_name
            && self.field_value.as_deref() == field_value
    }
}

/// An index allocated ahead of time for a trigger id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogEntry {
    /// Row id.
    #[serde(default)]
    pub id: String,
    /// Trigger the index is reserved for; upsert key.
    pub trigger_id: String,
    /// Owning config.
    pub config_id: String,
    /// The reserved index.
    pub index: i64,
    /// Last time the entry was written.
    pub modified_on: DateTime<Utc>,
}
