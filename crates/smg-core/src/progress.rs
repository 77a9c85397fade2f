//! Per-source progress tracking: rate, ETA, throttled log lines.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Observational progress callback: `(source_name, processed, total)`.
///
/// Invoked by the batch driver after each successfully appended page.
/// Carries no control flow; pipeline errors are never routed through it.
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Minimum interval between logged progress lines
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Tracks extraction progress for one source and logs a structured
/// progress line at most once per interval.
#[derive(Debug)]
pub struct ProgressTracker {
    source: String,
    total: u64,
    processed: u64,
    started: Instant,
    last_log: Option<Instant>,
    log_interval: Duration,
}

impl ProgressTracker {
    pub fn new(source: impl Into<String>, total: u64) -> Self {
        Self::with_interval(source, total, DEFAULT_LOG_INTERVAL)
    }

    pub fn with_interval(source: impl Into<String>, total: u64, log_interval: Duration) -> Self {
        Self {
            source: source.into(),
            total,
            processed: 0,
            started: Instant::now(),
            last_log: None,
            log_interval,
        }
    }

    /// Record the current processed count, logging if the interval passed.
    ///
    /// The first update always logs.
    pub fn update(&mut self, processed: u64) {
        self.processed = processed;

        let due = match self.last_log {
            None => true,
            Some(last) => last.elapsed() >= self.log_interval,
        };
        if !due {
            return;
        }

        info!(
            source = %self.source,
            processed = self.processed,
            total = self.total,
            percent = format!("{:.1}%", self.percent()),
            rate = format_rate(self.rate()),
            eta = format_eta(self.eta()),
            "Extraction progress"
        );
        self.last_log = Some(Instant::now());
    }

    /// Documents per second since the tracker started
    pub fn rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.processed as f64 / elapsed
    }

    /// Estimated time to completion, when a rate is available
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 || self.total == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.processed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }

    fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// Log the final per-source line
    pub fn finish(&self) {
        info!(
            source = %self.source,
            processed = self.processed,
            total = self.total,
            elapsed = format!("{:.2}s", self.started.elapsed().as_secs_f64()),
            rate = format_rate(self.rate()),
            "Extraction finished"
        );
    }
}

/// Human-readable documents-per-second
pub fn format_rate(rate: f64) -> String {
    if rate < 1.0 {
        format!("{:.2}/s", rate)
    } else if rate < 1000.0 {
        format!("{:.1}/s", rate)
    } else {
        format!("{:.1}k/s", rate / 1000.0)
    }
}

/// Human-readable ETA
pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return "unknown".to_string();
    };
    let secs = eta.as_secs_f64();

    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.25), "0.25/s");
        assert_eq!(format_rate(42.0), "42.0/s");
        assert_eq!(format_rate(2500.0), "2.5k/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(None), "unknown");
        assert_eq!(format_eta(Some(Duration::from_secs(42))), "42s");
        assert_eq!(format_eta(Some(Duration::from_secs(90))), "1.5m");
        assert_eq!(format_eta(Some(Duration::from_secs(5400))), "1.5h");
    }

    #[test]
    fn test_eta_requires_progress() {
        let tracker = ProgressTracker::new("products", 1000);
        assert!(tracker.eta().is_none());

        let mut tracker = ProgressTracker::new("products", 1000);
        tracker.update(500);
        assert!(tracker.rate() > 0.0);
        assert!(tracker.eta().is_some());
    }

    #[test]
    fn test_eta_none_for_unknown_total() {
        let mut tracker = ProgressTracker::new("products", 0);
        tracker.update(10);
        assert!(tracker.eta().is_none());
    }
}
