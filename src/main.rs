// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Stateweave CLI - compare, curate and apply state diffs

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stateweave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "STATEWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend API URL override
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Run against an in-memory backend loaded from a fixture file
    #[arg(long, global = true, env = "STATEWEAVE_OFFLINE")]
    offline: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which side of each pair the selected state sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Side {
    /// selected -> other
    Source,
    /// other -> selected
    Target,
}

/// Edge direction, for addressing a metadata record directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum DirectionArg {
    /// Relationship only exists in the target state
    Add,
    /// Relationship exists in both or neither
    Change,
    /// Relationship only exists in the source state
    Remove,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one state against others and summarise each pair
    Compare {
        /// State the others are compared with
        selected: String,

        /// States to compare against (all saved states if omitted)
        #[arg(long, value_delimiter = ',')]
        against: Vec<String>,

        /// Whether the selected state is the source or target of each pair
        #[arg(long, value_enum, default_value = "source")]
        side: Side,

        /// Container IDs to compare (configured scope if omitted)
        #[arg(long, value_delimiter = ',')]
        containers: Vec<String>,

        /// Container graph snapshot (JSON) for names and scope
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Render the comparison as a DOT diagram
        #[arg(long)]
        dot: bool,
    },

    /// Inspect one pair's diff, select entries and optionally push them
    Diff {
        /// Source state
        source: String,

        /// Target state
        target: String,

        /// Container IDs to compare (configured scope if omitted)
        #[arg(long, value_delimiter = ',')]
        containers: Vec<String>,

        /// Container graph snapshot (JSON) for names and scope
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Entries to leave out, as containerId-targetId
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Keep only these entries, as containerId-targetId
        #[arg(long, value_delimiter = ',', conflicts_with = "exclude")]
        only: Vec<String>,

        /// Apply the selection toward the target state
        #[arg(long, conflicts_with = "revert")]
        apply: bool,

        /// Revert the selection relative to the target state
        #[arg(long)]
        revert: bool,
    },

    /// Apply a diff file to the live graph
    Apply {
        /// Diff JSON file ("-" for stdin)
        file: PathBuf,

        /// Target state the diff leads to
        #[arg(long)]
        target: String,

        /// Container IDs in scope (diff's containers if omitted)
        #[arg(long, value_delimiter = ',')]
        containers: Vec<String>,
    },

    /// Revert a diff file from the live graph
    Revert {
        /// Diff JSON file ("-" for stdin)
        file: PathBuf,

        /// Target state the diff led to
        #[arg(long)]
        target: String,

        /// Container IDs in scope (diff's containers if omitted)
        #[arg(long, value_delimiter = ',')]
        containers: Vec<String>,
    },

    /// Read or edit transition metadata
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },

    /// Manage saved states
    State {
        /// Action: list, save, switch, delete
        action: String,

        /// State name
        name: Option<String>,

        /// Save the live graph under this name before switching
        #[arg(long)]
        save_current_as: Option<String>,
    },

    /// Score containers against a base state
    Scores {
        /// Base state
        #[arg(long, default_value = stateweave::types::BASE_STATE)]
        base: String,
    },

    /// Show effective configuration
    Config {
        /// Configuration key (all keys if omitted)
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub(crate) enum MetadataAction {
    /// Print every stored record
    List,

    /// Print one record by its full key
    Get {
        /// Container ID
        container: String,

        /// Target container ID
        target: String,

        /// Transition label, e.g. "None -> supports"
        #[arg(long)]
        transition: String,

        /// Edge direction
        #[arg(long, value_enum)]
        direction: DirectionArg,
    },

    /// Edit the record for one entry of a state pair's diff
    Set {
        /// Source state
        source: String,

        /// Target state
        target_state: String,

        /// Container ID
        container: String,

        /// Target container ID
        target: String,

        /// Numeric cost
        #[arg(long)]
        weight: Option<String>,

        /// Qualitative label
        #[arg(long)]
        qual_label: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = stateweave::config::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Commands that never reach the backend
    match &cli.command {
        Commands::Config { key } => return commands::config::run(&config, key.as_deref(), cli.json),
        Commands::Completions { shell } => {
            return commands::completions::run(*shell, &mut Cli::command());
        }
        _ => {}
    }

    let ctx = commands::Context::new(
        config,
        cli.offline.as_deref(),
        cli.json,
        cli.quiet,
        !cli.no_color,
    )?;

    // Execute command
    match cli.command {
        Commands::Compare { selected, against, side, containers, graph, dot } => {
            commands::compare::run(&ctx, &selected, against, side, &containers, graph, dot).await
        }
        Commands::Diff { source, target, containers, graph, exclude, only, apply, revert } => {
            let args = commands::diff::DiffArgs { exclude, only, apply, revert };
            commands::diff::run(&ctx, &source, &target, &containers, graph, args).await
        }
        Commands::Apply { file, target, containers } => {
            commands::apply::run(&ctx, commands::apply::Mode::Apply, &file, &target, containers).await
        }
        Commands::Revert { file, target, containers } => {
            commands::apply::run(&ctx, commands::apply::Mode::Revert, &file, &target, containers).await
        }
        Commands::Metadata { action } => commands::metadata::run(&ctx, action).await,
        Commands::State { action, name, save_current_as } => {
            commands::state::run(&ctx, &action, name, save_current_as).await
        }
        Commands::Scores { base } => commands::scores::run(&ctx, &base).await,
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}
