//! Sitemap Generation Engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns document identifiers held in Solr cores into sitemaps.org XML
//! file sets, one isolated pipeline per configured source.
//!
//! # Overview
//!
//! - **Extraction**: paginated Solr `select` queries with bounded retries
//!   and a per-source circuit breaker
//! - **Conversion**: URL templates with percent-encoded identifier
//!   substitution and timestamp normalization
//! - **Writing**: split, gzip-compressed sitemap files plus an index,
//!   written atomically
//! - **Orchestration**: a worker pool running sources concurrently, with
//!   cooperative cancellation and per-source result isolation
//!
//! # Architecture
//!
//! Each source runs through a fixed state machine: count the documents,
//! page through them in stable identifier order, convert rows to sitemap
//! entries, and finalize the file set. Failures are recorded per source
//! and never cross source boundaries; the run as a whole always produces
//! a [`RunResult`] describing what happened.
//!
//! # Example
//!
//! ```no_run
//! use smg_common::AppConfig;
//! use smg_core::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("smg.toml")?;
//!     config.validate()?;
//!
//!     let run = Orchestrator::new(config).run(None).await;
//!     println!(
//!         "{} URLs in {} files, success rate {:.0}%",
//!         run.total_urls,
//!         run.total_files,
//!         run.success_rate() * 100.0
//!     );
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod solr;
pub mod types;
pub mod urls;
pub mod writer;

// Re-export commonly used types
pub use breaker::{CircuitBreaker, CircuitState};
pub use driver::{BatchDriver, DriverState};
pub use error::{Error, ErrorClass, Result};
pub use orchestrator::Orchestrator;
pub use progress::{ProgressFn, ProgressTracker};
pub use solr::{RetryPolicy, SolrClient};
pub use types::{DocumentRecord, RunResult, SitemapEntry, SourceError, SourceResult};
pub use urls::UrlBuilder;
pub use writer::SitemapWriter;
