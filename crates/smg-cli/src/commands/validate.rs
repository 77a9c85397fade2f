//! `smg validate` command implementation
//!
//! Static configuration checks only; no store is contacted. Exits 0 when
//! the file passes, 2 when it does not.

use crate::error::Result;
use crate::exit::ExitCode;
use colored::Colorize;
use smg_common::config::AppConfig;
use smg_core::solr::TEST_MODE_DOC_LIMIT;

/// Validate the loaded configuration and print what was found
pub fn run(config: &AppConfig) -> Result<ExitCode> {
    config.validate()?;

    println!(
        "{} Configuration valid: {} source(s)",
        "✓".green(),
        config.sources.len()
    );
    println!();

    for source in &config.sources {
        println!("{}", source.name.green());
        println!("  Endpoint:   {}", source.endpoint);
        println!("  Template:   {}", source.url_template);
        println!("  Changefreq: {}", source.changefreq);
        println!("  Page size:  {}", source.page_size);
        if source.test_mode {
            println!(
                "  Test mode:  capped at {} document(s)",
                TEST_MODE_DOC_LIMIT
            );
        }
        println!();
    }

    println!("{}", "Output:".cyan().bold());
    println!("  Directory:     {}", config.sitemap.output_dir.display());
    println!("  Max URLs/file: {}", config.sitemap.max_urls_per_file);
    println!(
        "  Compression:   {}",
        if config.sitemap.compress { "gzip" } else { "none" }
    );
    println!("  Base URL:      {}", config.sitemap.base_url);

    Ok(ExitCode::Success)
}
