//! Batch driver: runs one source end to end.
//!
//! State machine per source: `Idle -> Counting -> Paging -> Finalizing ->
//! Done`, with `Failed` reachable from any state before files exist.
//! Template validation, the health probe, and the count query all happen
//! before the writer is created, so a source that fails early produces no
//! files at all. Once paging has begun, any truncation still passes
//! through `Finalizing` so already-buffered entries are flushed and the
//! index is written.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use smg_common::config::{SitemapConfig, SourceSpec};

use crate::error::Error;
use crate::progress::{ProgressFn, ProgressTracker};
use crate::solr::{RetryPolicy, SolrClient};
use crate::types::{SitemapEntry, SourceError, SourceResult};
use crate::urls::UrlBuilder;
use crate::writer::SitemapWriter;

/// Driver states, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Counting,
    Paging,
    Finalizing,
    Done,
    Failed,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Idle => write!(f, "idle"),
            DriverState::Counting => write!(f, "counting"),
            DriverState::Paging => write!(f, "paging"),
            DriverState::Finalizing => write!(f, "finalizing"),
            DriverState::Done => write!(f, "done"),
            DriverState::Failed => write!(f, "failed"),
        }
    }
}

/// Drives one source: count, page, convert, write, aggregate
pub struct BatchDriver {
    spec: SourceSpec,
    sitemap: SitemapConfig,
    cancel: CancellationToken,
    retry: Option<RetryPolicy>,
    progress: Option<ProgressFn>,
    state: DriverState,
}

impl BatchDriver {
    pub fn new(spec: SourceSpec, sitemap: SitemapConfig, cancel: CancellationToken) -> Self {
        Self {
            spec,
            sitemap,
            cancel,
            retry: None,
            progress: None,
            state: DriverState::Idle,
        }
    }

    /// Override the client retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Attach an observational progress callback
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the source to completion. Errors never escape: they are
    /// recorded in the returned [`SourceResult`].
    pub async fn run(mut self) -> SourceResult {
        let started = Instant::now();
        info!(
            source = %self.spec.name,
            endpoint = %self.spec.endpoint,
            page_size = self.spec.page_size,
            test_mode = self.spec.test_mode,
            "Starting source"
        );

        let (builder, client) = match self.prepare() {
            Ok(parts) => parts,
            Err(err) => return self.failed(started, 0, err),
        };

        self.set_state(DriverState::Counting);
        if let Err(err) = client.health_check().await {
            warn!(source = %self.spec.name, error = %err, "Health probe failed, skipping source");
            return self.failed(started, 0, err);
        }

        let total = match client.total_documents(&self.spec.id_field).await {
            Ok(total) => total,
            Err(err) => return self.failed(started, 0, err),
        };
        info!(source = %self.spec.name, total, "Counted documents");
        self.report_progress(0, total);

        let mut writer = match SitemapWriter::new(&self.sitemap, &self.spec.name) {
            Ok(writer) => writer,
            Err(err) => return self.failed(started, total, err),
        };

        self.set_state(DriverState::Paging);
        let mut errors: Vec<SourceError> = Vec::new();
        let mut processed: u64 = 0;
        let mut skipped: u64 = 0;
        let mut offset: u64 = 0;
        let mut tracker = ProgressTracker::new(&self.spec.name, total);

        'paging: while offset < total {
            if self.cancel.is_cancelled() {
                info!(source = %self.spec.name, offset, "Cancelled, finalizing partial output");
                errors.push(SourceError::from(&Error::Cancelled));
                break;
            }

            let page = match client
                .fetch_page(
                    &self.spec.id_field,
                    &self.spec.date_field,
                    offset,
                    self.spec.page_size,
                )
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    warn!(
                        source = %self.spec.name,
                        offset,
                        error = %err,
                        "Page fetch failed, truncating source"
                    );
                    errors.push(SourceError::from(&err));
                    break;
                },
            };

            if page.returned == 0 {
                // Store shrank mid-run or the test-mode cap was reached.
                debug!(source = %self.spec.name, offset, "Empty page, stopping");
                break;
            }

            skipped += page.skipped as u64;
            for record in &page.records {
                match builder.build(&record.id) {
                    Ok(loc) => {
                        let entry = SitemapEntry {
                            loc,
                            lastmod: record.last_modified,
                            changefreq: self.spec.changefreq,
                        };
                        if let Err(err) = writer.append(entry) {
                            warn!(
                                source = %self.spec.name,
                                error = %err,
                                "Write failed, truncating source"
                            );
                            errors.push(SourceError::from(&err));
                            break 'paging;
                        }
                        processed += 1;
                    },
                    Err(err) => {
                        warn!(
                            source = %self.spec.name,
                            id = %record.id,
                            error = %err,
                            "Skipping record with unusable identifier"
                        );
                        skipped += 1;
                    },
                }
            }

            // Offsets advance by rows the store returned, dropped records
            // included, so a drop never skips a row.
            offset += page.returned as u64;
            tracker.update(processed);
            self.report_progress(processed, total);

            if page.returned < self.spec.page_size {
                break;
            }
        }

        self.set_state(DriverState::Finalizing);
        let files = match writer.finish() {
            Ok(files) => files,
            Err(err) => {
                warn!(source = %self.spec.name, error = %err, "Finalize failed");
                errors.push(SourceError::from(&err));
                let files = writer.produced().to_vec();
                self.set_state(DriverState::Failed);
                return SourceResult {
                    source: self.spec.name.clone(),
                    total_docs: total,
                    processed_docs: processed,
                    skipped_docs: skipped,
                    files,
                    elapsed: started.elapsed(),
                    errors,
                };
            },
        };

        tracker.finish();
        self.set_state(DriverState::Done);
        info!(
            source = %self.spec.name,
            total,
            processed,
            skipped,
            files = files.len(),
            errors = errors.len(),
            elapsed = format!("{:.2}s", started.elapsed().as_secs_f64()),
            "Source finished"
        );

        SourceResult {
            source: self.spec.name.clone(),
            total_docs: total,
            processed_docs: processed,
            skipped_docs: skipped,
            files,
            elapsed: started.elapsed(),
            errors,
        }
    }

    /// Validate and count without writing anything.
    ///
    /// Performs template validation, the health probe, and the count
    /// query; reports what a full run would generate.
    pub async fn dry_run(mut self) -> SourceResult {
        let started = Instant::now();

        let (builder, client) = match self.prepare() {
            Ok(parts) => parts,
            Err(err) => return self.failed(started, 0, err),
        };

        self.set_state(DriverState::Counting);
        if let Err(err) = client.health_check().await {
            warn!(source = %self.spec.name, error = %err, "Health probe failed");
            return self.failed(started, 0, err);
        }

        let total = match client.total_documents(&self.spec.id_field).await {
            Ok(total) => total,
            Err(err) => return self.failed(started, 0, err),
        };

        let capacity = self.sitemap.max_urls_per_file as u64;
        info!(
            source = %self.spec.name,
            total,
            files = total.div_ceil(capacity.max(1)),
            sample_url = %builder.preview(),
            "Dry run: source reachable"
        );

        self.set_state(DriverState::Done);
        SourceResult {
            source: self.spec.name.clone(),
            total_docs: total,
            processed_docs: 0,
            skipped_docs: 0,
            files: Vec::new(),
            elapsed: started.elapsed(),
            errors: Vec::new(),
        }
    }

    fn prepare(&self) -> crate::error::Result<(UrlBuilder, SolrClient)> {
        let builder = UrlBuilder::new(&self.spec.url_template)?;
        let mut client = SolrClient::new(&self.spec, self.cancel.clone())?;
        if let Some(retry) = &self.retry {
            client = client.with_retry(retry.clone());
        }
        Ok((builder, client))
    }

    fn report_progress(&self, processed: u64, total: u64) {
        if let Some(cb) = &self.progress {
            cb(&self.spec.name, processed, total);
        }
    }

    fn failed(&mut self, started: Instant, total: u64, err: Error) -> SourceResult {
        self.set_state(DriverState::Failed);
        SourceResult {
            source: self.spec.name.clone(),
            total_docs: total,
            processed_docs: 0,
            skipped_docs: 0,
            files: Vec::new(),
            elapsed: started.elapsed(),
            errors: vec![SourceError::from(&err)],
        }
    }

    fn set_state(&mut self, next: DriverState) {
        debug!(
            source = %self.spec.name,
            from = %self.state,
            to = %next,
            "Driver state change"
        );
        self.state = next;
    }
}
