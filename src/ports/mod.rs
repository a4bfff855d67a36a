//! Port traits defining external boundaries.
//!
//! Each trait is a boundary between the numbering engine and a system it
//! does not own: records, configuration rows, time, metadata, ids and
//! files. Implementations live in `src/adapters/` and `src/store/`.

pub mod clock;
pub mod configs;
pub mod filesystem;
pub mod id_gen;
pub mod metadata;
pub mod records;

pub use clock::{Clock, TimeZones};
pub use configs::ConfigStore;
pub use filesystem::FileSystem;
pub use id_gen::IdGenerator;
pub use metadata::MetadataSource;
pub use records::RecordStore;

/// Error type returned by every port.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;
