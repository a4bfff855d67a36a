//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `autonum`.
#[derive(Debug, Parser)]
#[command(name = "autonum", version, about = "Generate numbers from templates")]
pub struct Cli {
    /// Root directory of the YAML store.
    #[arg(long, global = true, env = "AUTONUM_STORE", default_value = ".autonum")]
    pub store: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// The record a generation numbers.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Entity of the target record.
    #[arg(long, requires = "id")]
    pub entity: Option<String>,

    /// Id of the target record.
    #[arg(long, requires = "entity")]
    pub id: Option<String>,

    /// Value for `{param:N}`, in order; repeatable.
    #[arg(long = "param", value_name = "VALUE")]
    pub params: Vec<String>,

    /// Organization the metadata cache is keyed on.
    #[arg(long, default_value = "default")]
    pub org: String,

    /// Treat the trigger as an update rather than a create.
    #[arg(long)]
    pub update: bool,

    /// Seed for reproducible random tokens.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a number with the first matching config and store it.
    Generate {
        /// Config ids or names, tried in order.
        #[arg(required_unless_present = "trigger")]
        configs: Vec<String>,

        /// Claim the index reserved for this trigger id instead.
        #[arg(long, conflicts_with = "configs")]
        trigger: Option<String>,

        /// Target record and inputs.
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Generate from an inline `format;;field[;;validate[;;replacements]]` string.
    Inline {
        /// The inline config string.
        raw: String,

        /// Owner whose time zone applies.
        #[arg(long, default_value = "")]
        owner: String,

        /// Target record and inputs.
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Render the next number without saving anything.
    Preview {
        /// Config id or name.
        config: String,

        /// Target record and inputs.
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Show one config, or list all of them.
    Show {
        /// Config id or name.
        config: Option<String>,
    },
    /// List a config's sequence streams.
    Streams {
        /// Config id.
        config: String,
    },
    /// Manage back-log reservations.
    Backlog {
        /// Back-log operation.
        #[command(subcommand)]
        command: BacklogCommand,
    },
}

/// Back-log subcommands.
#[derive(Debug, Subcommand)]
pub enum BacklogCommand {
    /// Reserve the next index for a trigger id.
    Allocate {
        /// Config id or name.
        config: String,
        /// Trigger id the index is reserved for.
        trigger: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{BacklogCommand, Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_generate_with_target_and_params() {
        let cli = Cli::parse_from([
            "autonum", "--store", "/tmp/s", "generate", "inv", "fallback", "--entity", "invoice", "--id", "i1",
            "--param", "A", "--param", "B",
        ]);
        assert_eq!(cli.store.to_str(), Some("/tmp/s"));
        let Command::Generate { configs, trigger, target } = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(configs, ["inv", "fallback"]);
        assert!(trigger.is_none());
        assert_eq!(target.entity.as_deref(), Some("invoice"));
        assert_eq!(target.params, ["A", "B"]);
        assert_eq!(target.org, "default");
    }

    #[test]
    fn generate_needs_configs_or_trigger() {
        assert!(Cli::try_parse_from(["autonum", "generate"]).is_err());
        let cli = Cli::parse_from(["autonum", "generate", "--trigger", "t1"]);
        assert!(matches!(cli.command, Command::Generate { trigger: Some(_), .. }));
    }

    #[test]
    fn entity_and_id_go_together() {
        assert!(Cli::try_parse_from(["autonum", "inline", "X;;f", "--entity", "case"]).is_err());
    }

    #[test]
    fn parses_backlog_allocate() {
        let cli = Cli::parse_from(["autonum", "--json", "backlog", "allocate", "inv", "t9"]);
        assert!(cli.json);
        let Command::Backlog { command: BacklogCommand::Allocate { config, trigger } } = cli.command else {
            panic!("expected backlog allocate");
        };
        assert_eq!((config.as_str(), trigger.as_str()), ("inv", "t9"));
    }
}
