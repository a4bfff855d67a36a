//! In-memory adapters.
//!
//! Deterministic stand-ins for every port. Tests and the `preview`
//! command run the engine against these; the stores count their writes
//! so callers can assert what was persisted.

pub mod clock;
pub mod configs;
pub mod filesystem;
pub mod id_gen;
pub mod metadata;
pub mod records;

pub use clock::FixedClock;
pub use configs::MemoryConfigStore;
pub use filesystem::MemoryFileSystem;
pub use id_gen::SequentialIdGenerator;
pub use metadata::{StaticMetadata, StaticTimeZones};
pub use records::MemoryRecordStore;
