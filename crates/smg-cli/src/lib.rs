//! SMG CLI Library
//!
//! Command-line interface for the SMG sitemap generator.
//!
//! # Overview
//!
//! The `smg` binary turns configured document stores into sitemaps.org
//! sitemap files:
//!
//! - **Generation**: extract every source and write sitemap files plus an
//!   index per source (`smg generate`)
//! - **Dry runs**: probe stores and report counts without writing anything
//!   (`smg generate --dry-run`)
//! - **Validation**: statically check the configuration file
//!   (`smg validate`)
//!
//! Process exit codes classify the outcome for monitoring systems; see
//! [`exit::ExitCode`].

pub mod commands;
pub mod error;
pub mod exit;
pub mod progress;

// Re-export commonly used types
pub use error::{CliError, Result};
pub use exit::ExitCode;

use clap::{Parser, Subcommand};
use smg_common::config::DEFAULT_CONFIG_FILE;
use smg_common::logging::LogLevel;
use std::path::PathBuf;

/// SMG - Sitemap generator for Solr-style document stores
#[derive(Parser, Debug)]
#[command(name = "smg")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(
        short,
        long,
        env = "SMG_CONFIG",
        default_value = DEFAULT_CONFIG_FILE,
        global = true
    )]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate sitemap files for every configured source
    Generate {
        /// Probe stores and report counts without writing any files
        #[arg(long)]
        dry_run: bool,

        /// Output directory (overrides sitemap.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent sources (overrides parallel_workers)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Suppress progress bars (log output is unaffected)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check the configuration file without contacting any store
    Validate,
}
