//! Domain types shared by the engine, ports and adapters.

pub mod condition;
pub mod config;
pub mod record;
pub mod stream;

pub use condition::Condition;
pub use config::{ConfigPatch, ConfigStatus, NumberingConfig, ResetInterval};
pub use record::{EntityRef, Record, Value};
pub use stream::{BacklogEntry, Stream};
