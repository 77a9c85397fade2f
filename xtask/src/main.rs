//! Build automation tasks for SMG
//!
//! This tool provides various automation tasks for the SMG project, including:
//! - Generating CLI documentation from source code
//! - Future build-related tasks

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for SMG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate CLI documentation in markdown format
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    // Generate markdown from clap definitions
    let markdown = clap_markdown::help_markdown::<smg_cli::Cli>();

    let content = format!(
        r#"# SMG CLI Reference

This documentation is auto-generated from the CLI source code. Last updated: {}.

## Overview

SMG generates sitemaps.org-compliant sitemap files from Solr-style document
stores. Each configured source is paged through, document identifiers become
URLs, and the result is written as gzip-compressed sitemap files plus an
index per source.

## Quick Start

```bash
# Check the configuration file
smg validate

# Probe stores and report counts without writing anything
smg generate --dry-run

# Generate sitemaps for every configured source
smg generate

# Override the output directory and concurrency
smg generate --output /var/www/sitemaps --workers 8
```

## Commands

{}

## Exit Codes

| Code | Meaning |
|------|---------|
| 0    | Every source completed without errors |
| 1    | General error |
| 2    | Configuration failed to load or validate |
| 3    | Complete failure, connection errors only |
| 4    | Complete failure, mixed or local causes |
| 6    | Interrupted by a shutdown signal |
| 7    | Partial success |

## Environment Variables

- `SMG_CONFIG` - Configuration file path (default: `smg.toml`)
- `SMG_OUTPUT_DIR` - Output directory override
- `SMG_WORKERS` - Concurrent source ceiling override
- `SMG_MAX_RETRIES` - Attempts per request, first try included (default: 3)
- `SMG_RETRY_BASE_MS` - Base delay for exponential backoff (default: 1000)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILE_PREFIX`,
  `LOG_FILTER` - Logging configuration

## Configuration

SMG reads a TOML file (default `smg.toml`) with one `[[sources]]` table per
document store plus a global `[sitemap]` section:

```toml
parallel_workers = 4

[sitemap]
output_dir = "./sitemaps"
max_urls_per_file = 50000
compress = true
base_url = "https://www.example.org/sitemaps/"

[[sources]]
name = "products"
endpoint = "http://localhost:8983/solr/products"
id_field = "id"
date_field = "last_modified"
url_template = "https://www.example.org/product/{{id}}"
changefreq = "daily"
```

---

*This documentation is automatically generated from the CLI source code. To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    // Create output directory if it doesn't exist
    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    // Write the markdown file
    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the generated documentation");
    println!("  2. Commit it to version control");

    Ok(())
}
