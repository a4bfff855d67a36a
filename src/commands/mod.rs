//! Command dispatch and handlers.

pub mod backlog;
pub mod generate;
pub mod show;

use serde::Serialize;

use crate::cli::{BacklogCommand, Cli, Command};
use crate::context::ServiceContext;
use crate::select::ConfigSource;

/// How handlers print their results.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Print JSON instead of text.
    pub json: bool,
}

impl Output {
    /// Prints `value` as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error string if serialization fails.
    pub fn print_json<T: Serialize>(self, value: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode output: {e}"))?;
        println!("{json}");
        Ok(())
    }
}

/// Dispatch a parsed command to its handler over the store at `cli.store`.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let ctx = ServiceContext::live(&cli.store);
    let output = Output { json: cli.json };

    match &cli.command {
        Command::Generate { configs, trigger, target } => {
            let source = match trigger {
                Some(trigger) => ConfigSource::Backlog(trigger.clone()),
                None => ConfigSource::Candidates(configs.clone()),
            };
            generate::run(&ctx, &source, "", target, output)
        }
        Command::Inline { raw, owner, target } => {
            generate::run(&ctx, &ConfigSource::Inline(raw.clone()), owner, target, output)
        }
        Command::Preview { config, target } => generate::preview(&ctx, config, target, output),
        Command::Show { config } => show::run(&cli.store, config.as_deref(), output),
        Command::Streams { config } => show::streams(&ctx, config, output),
        Command::Backlog { command: BacklogCommand::Allocate { config, trigger } } => {
            backlog::allocate(&ctx, config, trigger, output)
        }
    }
}
