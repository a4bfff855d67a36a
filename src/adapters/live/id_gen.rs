//! UUID-based ids for locking tokens and new rows.

use uuid::Uuid;

use crate::ports::IdGenerator;

/// Generates random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
