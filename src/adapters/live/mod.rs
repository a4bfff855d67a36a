//! Adapters backed by the running system.

pub mod clock;
pub mod filesystem;
pub mod id_gen;
