//! Data model shared across the pipeline.
//!
//! Records flow strictly downward: the Solr client produces
//! [`DocumentRecord`] values, the batch driver turns them into
//! [`SitemapEntry`] values for the writer, and results travel back up as
//! [`SourceResult`] and [`RunResult`].

use chrono::{DateTime, Utc};
use smg_common::config::ChangeFreq;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, ErrorClass};

/// One row fetched from a document store
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Document identifier, never empty
    pub id: String,

    /// Parsed last-modified timestamp, if the store had one
    pub last_modified: Option<DateTime<Utc>>,
}

/// One `<url>` entry destined for a sitemap file
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Absolute URL
    pub loc: String,

    /// Last-modified timestamp for `<lastmod>`, omitted when absent
    pub lastmod: Option<DateTime<Utc>>,

    /// Revisit frequency for `<changefreq>`
    pub changefreq: ChangeFreq,
}

/// One recorded failure, classified for exit-code mapping
#[derive(Debug, Clone)]
pub struct SourceError {
    pub class: ErrorClass,
    pub message: String,
}

impl From<&Error> for SourceError {
    fn from(err: &Error) -> Self {
        Self {
            class: err.class(),
            message: err.to_string(),
        }
    }
}

/// Outcome of processing one source, immutable once returned
#[derive(Debug, Clone)]
pub struct SourceResult {
    /// Source name from configuration
    pub source: String,

    /// Document count the store reported at the start of the run
    pub total_docs: u64,

    /// Documents actually converted into sitemap entries
    pub processed_docs: u64,

    /// Records dropped for missing or empty identifiers
    pub skipped_docs: u64,

    /// Produced files in write order, index last
    pub files: Vec<PathBuf>,

    /// Wall-clock time spent on this source
    pub elapsed: Duration,

    /// Errors recorded during the run, in occurrence order
    pub errors: Vec<SourceError>,
}

impl SourceResult {
    /// A source succeeded iff it recorded no errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages in occurrence order
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }
}

/// Aggregate outcome of one full run across all sources
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Per-source results in configuration order
    pub sources: Vec<SourceResult>,

    /// Sum of processed documents across sources
    pub total_urls: u64,

    /// Total files produced, indexes included
    pub total_files: usize,

    /// Wall-clock duration of the whole run
    pub elapsed: Duration,
}

impl RunResult {
    /// Aggregate per-source results, computing run totals
    pub fn from_sources(sources: Vec<SourceResult>, elapsed: Duration) -> Self {
        let total_urls = sources.iter().map(|s| s.processed_docs).sum();
        let total_files = sources.iter().map(|s| s.files.len()).sum();

        Self {
            sources,
            total_urls,
            total_files,
            elapsed,
        }
    }

    /// Fraction of sources that finished without errors, in `[0, 1]`
    pub fn success_rate(&self) -> f64 {
        if self.sources.is_empty() {
            return 1.0;
        }
        let ok = self.sources.iter().filter(|s| s.is_success()).count();
        ok as f64 / self.sources.len() as f64
    }

    /// Whether every source finished without errors
    pub fn is_success(&self) -> bool {
        self.sources.iter().all(SourceResult::is_success)
    }

    /// Whether any source recorded a cancellation
    pub fn was_interrupted(&self) -> bool {
        self.sources
            .iter()
            .flat_map(|s| s.errors.iter())
            .any(|e| e.class == ErrorClass::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn result(source: &str, errors: Vec<SourceError>) -> SourceResult {
        SourceResult {
            source: source.to_string(),
            total_docs: 100,
            processed_docs: 100,
            skipped_docs: 0,
            files: vec![PathBuf::from(format!("sitemap-{}-0001.xml.gz", source))],
            elapsed: Duration::from_secs(1),
            errors,
        }
    }

    #[test]
    fn test_source_success_means_no_errors() {
        assert!(result("a", vec![]).is_success());

        let failed = result(
            "b",
            vec![SourceError {
                class: ErrorClass::Connection,
                message: "refused".to_string(),
            }],
        );
        assert!(!failed.is_success());
        assert_eq!(failed.error_messages(), vec!["refused".to_string()]);
    }

    #[test]
    fn test_run_totals_and_success_rate() {
        let failed = result(
            "b",
            vec![SourceError {
                class: ErrorClass::Connection,
                message: "refused".to_string(),
            }],
        );
        let run = RunResult::from_sources(
            vec![result("a", vec![]), failed],
            Duration::from_secs(2),
        );

        assert_eq!(run.total_urls, 200);
        assert_eq!(run.total_files, 2);
        assert!((run.success_rate() - 0.5).abs() < f64::EPSILON);
        assert!(!run.is_success());
        assert!(!run.was_interrupted());
    }

    #[test]
    fn test_interrupted_run_detected() {
        let cancelled = result(
            "a",
            vec![SourceError {
                class: ErrorClass::Cancelled,
                message: "Operation cancelled".to_string(),
            }],
        );
        let run = RunResult::from_sources(vec![cancelled], Duration::from_secs(1));
        assert!(run.was_interrupted());
    }
}
