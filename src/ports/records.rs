//! Record store port.

use std::collections::BTreeMap;

use super::PortError;
use crate::model::{Record, Value};

/// Reads and writes the records being numbered.
pub trait RecordStore: Send + Sync {
    /// Fetches a record, limited to `columns` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or cannot be read.
    fn get(&self, entity: &str, id: &str, columns: Option<&[&str]>) -> Result<Record, PortError>;

    /// Writes the given fields onto an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the write fails.
    fn update(
        &self,
        entity: &str,
        id: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<(), PortError>;

    /// Returns `true` if any record of `entity` has `field` equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn exists_with_value(&self, entity: &str, field: &str, value: &str) -> Result<bool, PortError>;

    /// Evaluates a filter condition against one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition cannot be evaluated.
    fn matches_condition(&self, entity: &str, id: &str, condition: &str) -> Result<bool, PortError>;
}
