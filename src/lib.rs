//! Core library for `autonum`: template-driven number generation with
//! sequence streams, resets and uniqueness checks.
//!
//! The entry point is [`engine::NumberingEngine::generate`]. Every system
//! the engine talks to sits behind a trait in [`ports`], bundled into a
//! [`context::ServiceContext`].

pub mod adapters;
pub mod backlog;
pub mod cli;
pub mod commands;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod metadata;
pub mod model;
pub mod ports;
pub mod select;
pub mod sequence;
pub mod store;
pub mod template;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}
