//! Coordinates batch drivers across all configured sources.
//!
//! Runs one [`BatchDriver`] per source with a semaphore bounding how many
//! execute at once; sources beyond the ceiling queue in configuration
//! order. Drivers own their state exclusively and communicate back only
//! through [`SourceResult`] values, so one failing source can never
//! corrupt another. Results are reported in configuration order no
//! matter which source finishes first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use smg_common::AppConfig;

use crate::driver::BatchDriver;
use crate::error::Error;
use crate::progress::ProgressFn;
use crate::solr::RetryPolicy;
use crate::types::{RunResult, SourceError, SourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Generate,
    DryRun,
}

/// Fans sources out to batch drivers and aggregates their results
pub struct Orchestrator {
    config: AppConfig,
    cancel: CancellationToken,
    retry: Option<RetryPolicy>,
}

impl Orchestrator {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            retry: None,
        }
    }

    /// Override the retry policy applied to every driver
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Token observed by every driver. Cancel it to stop the run:
    /// in-flight sources flush and finalize, queued sources are skipped.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generate sitemaps for every configured source.
    ///
    /// Never fails as a whole: per-source failures are recorded in the
    /// returned [`RunResult`] and healthy sources complete regardless.
    pub async fn run(&self, progress: Option<ProgressFn>) -> RunResult {
        self.execute(progress, RunMode::Generate).await
    }

    /// Validate templates, probe stores, and count documents without
    /// writing any files.
    pub async fn dry_run(&self) -> RunResult {
        self.execute(None, RunMode::DryRun).await
    }

    async fn execute(&self, progress: Option<ProgressFn>, mode: RunMode) -> RunResult {
        let started = Instant::now();
        let workers = self.config.parallel_workers.max(1);
        info!(
            sources = self.config.sources.len(),
            workers,
            dry_run = mode == RunMode::DryRun,
            "Starting sitemap run"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut indexed: Vec<(usize, SourceResult)> =
            stream::iter(self.config.sources.iter().cloned().enumerate())
                .map(|(index, spec)| {
                    let semaphore = Arc::clone(&semaphore);
                    let sitemap = self.config.sitemap.clone();
                    let cancel = self.cancel.clone();
                    let retry = self.retry.clone();
                    let progress = progress.clone();

                    async move {
                        let _permit = semaphore.acquire().await;
                        if cancel.is_cancelled() {
                            // Queued behind the ceiling when the run was stopped.
                            return (index, skipped_result(&spec.name));
                        }

                        let mut driver = BatchDriver::new(spec, sitemap, cancel);
                        if let Some(retry) = retry {
                            driver = driver.with_retry(retry);
                        }
                        if let Some(progress) = progress {
                            driver = driver.with_progress(progress);
                        }

                        let result = match mode {
                            RunMode::Generate => driver.run().await,
                            RunMode::DryRun => driver.dry_run().await,
                        };
                        (index, result)
                    }
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        // Completion order is nondeterministic; reports are not.
        indexed.sort_by_key(|(index, _)| *index);
        let sources: Vec<SourceResult> = indexed.into_iter().map(|(_, result)| result).collect();

        let run = RunResult::from_sources(sources, started.elapsed());
        info!(
            sources = run.sources.len(),
            urls = run.total_urls,
            files = run.total_files,
            success_rate = format!("{:.0}%", run.success_rate() * 100.0),
            elapsed = format!("{:.2}s", run.elapsed.as_secs_f64()),
            "Run complete"
        );
        run
    }
}

/// Result for a source that never started because the run was cancelled
fn skipped_result(source: &str) -> SourceResult {
    SourceResult {
        source: source.to_string(),
        total_docs: 0,
        processed_docs: 0,
        skipped_docs: 0,
        files: Vec::new(),
        elapsed: Duration::ZERO,
        errors: vec![SourceError::from(&Error::Cancelled)],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use smg_common::config::SourceSpec;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1))
    }

    fn source_for(server: &MockServer, name: &str) -> SourceSpec {
        let mut spec = AppConfig::test_config().sources.remove(0);
        spec.name = name.to_string();
        spec.endpoint = Url::parse(&server.uri()).unwrap();
        spec.page_size = 100;
        spec
    }

    fn config_for(dir: &TempDir, sources: Vec<SourceSpec>) -> AppConfig {
        let mut config = AppConfig::test_config();
        config.sources = sources;
        config.sitemap.output_dir = dir.path().to_path_buf();
        config.parallel_workers = 2;
        config
    }

    async fn mount_healthy(server: &MockServer, total: u64, ids: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/admin/ping"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "OK" })),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/select"))
            .and(query_param("rows", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": { "numFound": total, "docs": [] }
            })))
            .mount(server)
            .await;

        let docs: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "last_modified": "2024-01-15T10:30:00Z" }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/select"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": { "numFound": total, "docs": docs }
            })))
            .mount(server)
            .await;
    }

    async fn mount_unreachable(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/admin/ping"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_run_reports_sources_in_configuration_order() {
        let products = MockServer::start().await;
        let articles = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_healthy(&products, 2, &["1", "2"]).await;
        mount_healthy(&articles, 3, &["a", "b", "c"]).await;

        let config = config_for(
            &dir,
            vec![
                source_for(&products, "products"),
                source_for(&articles, "articles"),
            ],
        );
        let run = Orchestrator::new(config)
            .with_retry(fast_retry())
            .run(None)
            .await;

        assert!(run.is_success());
        assert_eq!(run.sources[0].source, "products");
        assert_eq!(run.sources[1].source, "articles");
        assert_eq!(run.total_urls, 5);
        // One data file plus one index per source.
        assert_eq!(run.total_files, 4);
    }

    #[tokio::test]
    async fn test_failed_source_does_not_affect_healthy_one() {
        let healthy = MockServer::start().await;
        let broken = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_healthy(&healthy, 2, &["1", "2"]).await;
        mount_unreachable(&broken).await;

        let config = config_for(
            &dir,
            vec![
                source_for(&healthy, "products"),
                source_for(&broken, "articles"),
            ],
        );
        let run = Orchestrator::new(config)
            .with_retry(fast_retry())
            .run(None)
            .await;

        assert!(!run.is_success());
        assert!((run.success_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(run.sources[0].files.len(), 2);
        assert_eq!(run.sources[1].files.len(), 0);
        assert_eq!(run.sources[1].errors[0].class, ErrorClass::Connection);
    }

    #[tokio::test]
    async fn test_single_worker_completes_all_sources() {
        let products = MockServer::start().await;
        let articles = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_healthy(&products, 1, &["1"]).await;
        mount_healthy(&articles, 1, &["a"]).await;

        let mut config = config_for(
            &dir,
            vec![
                source_for(&products, "products"),
                source_for(&articles, "articles"),
            ],
        );
        config.parallel_workers = 1;

        let run = Orchestrator::new(config)
            .with_retry(fast_retry())
            .run(None)
            .await;

        assert!(run.is_success());
        assert_eq!(run.total_urls, 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_queued_sources() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = config_for(&dir, vec![source_for(&server, "products")]);
        let orchestrator = Orchestrator::new(config).with_retry(fast_retry());
        orchestrator.cancel_token().cancel();

        let run = orchestrator.run(None).await;

        assert!(run.was_interrupted());
        assert_eq!(run.sources[0].errors[0].class, ErrorClass::Cancelled);
        assert!(run.sources[0].files.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_files() {
        let products = MockServer::start().await;
        let articles = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_healthy(&products, 10, &[]).await;
        mount_healthy(&articles, 32, &[]).await;

        let config = config_for(
            &dir,
            vec![
                source_for(&products, "products"),
                source_for(&articles, "articles"),
            ],
        );
        let run = Orchestrator::new(config)
            .with_retry(fast_retry())
            .dry_run()
            .await;

        assert!(run.is_success());
        assert_eq!(run.sources[0].total_docs, 10);
        assert_eq!(run.sources[1].total_docs, 32);
        assert_eq!(run.total_files, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
