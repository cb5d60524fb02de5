//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod export;
mod helpers;
mod writeback;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use helpers::CoordinateArgs;
use snowloop::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "snowloop")]
#[command(about = "Sync warehouse tables with prompt datasets")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only accept plain identifiers as table names
    #[arg(long, global = true)]
    strict_table_names: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every row of a table as a prompt item
    Export {
        /// Table to read (interpolated into the query as given)
        #[arg(long)]
        table: String,
        /// Target dataset ID
        #[arg(long)]
        dataset: String,
        #[command(flatten)]
        coordinates: CoordinateArgs,
    },

    /// Write an item's best response back into its table row
    Writeback {
        /// Item ID on the platform
        #[arg(long)]
        item: String,
        /// Table to update
        #[arg(long)]
        table: String,
        #[command(flatten)]
        coordinates: CoordinateArgs,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (mut settings, _config) = load_settings_with_options(options).await;
    if cli.strict_table_names {
        settings.strict_table_names = true;
    }

    match cli.command {
        Commands::Export {
            table,
            dataset,
            coordinates,
        } => {
            let coordinates = coordinates.resolve(&settings.coordinates)?;
            export::cmd_export(&settings, &coordinates, &table, &dataset).await
        }
        Commands::Writeback {
            item,
            table,
            coordinates,
        } => {
            let coordinates = coordinates.resolve(&settings.coordinates)?;
            writeback::cmd_writeback(&settings, &coordinates, &table, &item).await
        }
    }
}
