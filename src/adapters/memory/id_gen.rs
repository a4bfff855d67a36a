//! Predictable id generator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ports::IdGenerator;

/// Produces `<prefix>-1`, `<prefix>-2`, ...
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_string(), next: AtomicU64::new(1) }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_id(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::Relaxed))
    }
}
