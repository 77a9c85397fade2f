//! `smg generate` command implementation
//!
//! Runs the full pipeline: apply overrides, validate the configuration,
//! fan sources out to the orchestrator, render progress, and map the
//! outcome to an exit code. With `--dry-run` the stores are only probed
//! and counted; nothing is written.

use crate::error::Result;
use crate::exit::ExitCode;
use crate::progress::ProgressReporter;
use colored::Colorize;
use smg_common::config::AppConfig;
use smg_core::{Orchestrator, RunResult, SourceResult};
use std::path::PathBuf;
use tracing::warn;

/// Generate sitemaps for every configured source
pub async fn run(
    mut config: AppConfig,
    dry_run: bool,
    output: Option<PathBuf>,
    workers: Option<usize>,
    quiet: bool,
) -> Result<ExitCode> {
    // Environment first, explicit flags last.
    config.apply_env_overrides();
    if let Some(output) = output {
        config.sitemap.output_dir = output;
    }
    if let Some(workers) = workers {
        config.parallel_workers = workers;
    }
    config.validate()?;

    let sources = config.sources.clone();
    let max_per_file = config.sitemap.max_urls_per_file as u64;
    let orchestrator = Orchestrator::new(config);

    // First Ctrl-C stops the run gracefully: in-flight sources flush and
    // finalize, queued sources are skipped.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, stopping run");
            eprintln!("\nInterrupted, finishing sources already in flight...");
            cancel.cancel();
        }
    });

    if dry_run {
        println!(
            "{} Dry run: probing {} source(s)...",
            "→".cyan(),
            sources.len()
        );
        let run = orchestrator.dry_run().await;
        print_dry_run(&run, max_per_file);
        return Ok(ExitCode::from_run(&run));
    }

    println!(
        "{} Generating sitemaps for {} source(s)...",
        "→".cyan(),
        sources.len()
    );

    let run = if quiet {
        orchestrator.run(None).await
    } else {
        let reporter = ProgressReporter::new(&sources);
        let run = orchestrator.run(Some(reporter.callback())).await;
        reporter.finish();
        run
    };

    print_summary(&run);
    Ok(ExitCode::from_run(&run))
}

fn print_summary(run: &RunResult) {
    println!();
    for source in &run.sources {
        print_source_line(source);
    }

    println!();
    let totals = format!(
        "{} URLs across {} file(s) in {:.1}s",
        run.total_urls,
        run.total_files,
        run.elapsed.as_secs_f64()
    );
    if run.is_success() {
        println!("{} {}", "✓".green().bold(), totals);
    } else {
        println!(
            "{} {} ({:.0}% of sources succeeded)",
            "✗".red().bold(),
            totals,
            run.success_rate() * 100.0
        );
    }
}

fn print_source_line(source: &SourceResult) {
    if source.is_success() {
        let mut line = format!(
            "{}: {} URLs in {} file(s) ({:.1}s)",
            source.source,
            source.processed_docs,
            source.files.len(),
            source.elapsed.as_secs_f64()
        );
        if source.skipped_docs > 0 {
            line.push_str(&format!(", {} record(s) skipped", source.skipped_docs));
        }
        println!("{} {}", "✓".green(), line);
        return;
    }

    let detail = source
        .errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "failed".to_string());
    if source.processed_docs > 0 {
        // Truncated: partial files are on disk and the index covers them.
        println!(
            "{} {}: {} of {} URLs written before failure: {}",
            "✗".red(),
            source.source,
            source.processed_docs,
            source.total_docs,
            detail
        );
    } else {
        println!("{} {}: {}", "✗".red(), source.source, detail);
    }
}

fn print_dry_run(run: &RunResult, max_per_file: u64) {
    println!();
    for source in &run.sources {
        if source.is_success() {
            println!(
                "{} {}: {} document(s), would write {} data file(s) plus index",
                "✓".green(),
                source.source,
                source.total_docs,
                estimated_data_files(source.total_docs, max_per_file)
            );
        } else {
            print_source_line(source);
        }
    }

    let total_docs: u64 = run.sources.iter().map(|s| s.total_docs).sum();
    println!();
    if run.is_success() {
        println!(
            "{} {} document(s) across {} source(s)",
            "✓".green().bold(),
            total_docs,
            run.sources.len()
        );
    } else {
        println!(
            "{} {:.0}% of sources reachable",
            "✗".red().bold(),
            run.success_rate() * 100.0
        );
    }
    println!("No files were written.");
}

/// Data files a full run would produce for `total` documents
fn estimated_data_files(total: u64, max_per_file: u64) -> u64 {
    total.div_ceil(max_per_file.max(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_data_files() {
        assert_eq!(estimated_data_files(0, 50_000), 0);
        assert_eq!(estimated_data_files(1, 50_000), 1);
        assert_eq!(estimated_data_files(50_000, 50_000), 1);
        assert_eq!(estimated_data_files(50_001, 50_000), 2);
        assert_eq!(estimated_data_files(125_000, 50_000), 3);
    }
}
