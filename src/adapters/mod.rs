//! Port implementations.
//!
//! `live` talks to the real system (clock, UUIDs, disk). `memory` keeps
//! everything in process and counts writes; tests and dry runs use it.
//! The YAML-backed record and config store lives in [`crate::store`].

pub mod live;
pub mod memory;
