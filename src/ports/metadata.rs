//! Metadata port for option labels and primary-name attributes.

use super::PortError;

/// Primary-name attribute assumed for entities with no registration.
pub const DEFAULT_PRIMARY_NAME: &str = "name";

/// Answers schema questions the field evaluator needs.
///
/// Lookups are slow on real platforms; the engine goes through
/// [`crate::metadata::MetadataCache`] rather than calling this directly.
pub trait MetadataSource: Send + Sync {
    /// Label of an option-set value, if the value is defined.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute metadata cannot be read.
    fn option_label(
        &self,
        entity: &str,
        attribute: &str,
        value: i32,
    ) -> Result<Option<String>, PortError>;

    /// Name of the entity's primary-name attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity metadata cannot be read.
    fn primary_name_attribute(&self, entity: &str) -> Result<String, PortError>;
}
