//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: run the control loop in the foreground
//! - stats: summarize persisted decisions and actions
//! - check-config: validate and print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Autoloop - an adaptive observe/decide/act control loop
#[derive(Parser, Debug)]
#[command(name = "autoloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the control loop until Ctrl-C
    Run {
        /// Print a status line every N seconds (0 disables)
        #[arg(short, long, default_value_t = 30)]
        report_secs: u64,

        /// Force one action right after starting (kind, or fallback when empty)
        #[arg(short, long)]
        force: Option<Option<String>>,
    },

    /// Print statistics from the configured store
    Stats,

    /// Validate configuration and print the effective values
    CheckConfig,
}
