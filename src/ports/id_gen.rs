//! ID generator port for new stream and back-log rows.

/// Generates unique row identifiers.
///
/// Stores call this when lazily creating a stream, so tests can assert
/// on predictable ids.
pub trait IdGenerator: Send + Sync {
    /// Generates a new unique identifier string.
    fn generate_id(&self) -> String;
}
