//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// upd - concurrent update orchestrator for system package managers
#[derive(Parser)]
#[command(name = "upd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run every configured package-manager plugin concurrently")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format (events as JSON lines, report as JSON)
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run update pipelines for configured plugins
    #[command(alias = "up")]
    Run {
        /// Specific plugins to run (empty = all configured)
        plugins: Vec<String>,

        /// Ask plugins what they would do without applying changes
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of simultaneously active pipelines
        #[arg(long, value_name = "N")]
        max_concurrency: Option<usize>,
    },

    /// List configured plugins and their capabilities
    #[command(alias = "ls")]
    List,

    /// Run a plugin's capability and estimate probes and show the results
    Probe {
        /// Plugin name
        plugin: String,
    },
}
