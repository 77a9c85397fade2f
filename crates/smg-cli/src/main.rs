//! SMG CLI - Main entry point

use clap::Parser;
use smg_cli::{Cli, CliError, Commands, ExitCode};
use smg_common::config::AppConfig;
use smg_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Load a local .env first so SMG_* variables reach clap's env defaults.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Both subcommands start from the configuration file.
    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            let err = CliError::from(err);
            eprintln!("Error: {}", err);
            process::exit(ExitCode::for_error(&err).code());
        },
    };

    // Level priority: --log-level, then --verbose, then the config file.
    let level = cli
        .log_level
        .or(if cli.verbose {
            Some(LogLevel::Debug)
        } else {
            None
        })
        .or(config.log_level)
        .unwrap_or(LogLevel::Warn);

    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("smg")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config
        .overlay_env()
        .unwrap_or_else(|_| LogConfig::default());

    // Initialize logging (ignore errors as the CLI should work without logging)
    let _ = init_logging(&log_config);

    // Execute command
    match execute_command(cli, config).await {
        Ok(code) => process::exit(code.code()),
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Error: {}", err);
            process::exit(ExitCode::for_error(&err).code());
        },
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli, config: AppConfig) -> smg_cli::Result<ExitCode> {
    match cli.command {
        Commands::Generate {
            dry_run,
            output,
            workers,
            quiet,
        } => smg_cli::commands::generate::run(config, dry_run, output, workers, quiet).await,

        Commands::Validate => smg_cli::commands::validate::run(&config),
    }
}
