//! Progress bar rendering for generate runs
//!
//! One bar per source, drawn together under a shared `MultiProgress` and
//! fed by the pipeline's progress callback. Bars are created up front in
//! configuration order so queued sources are visible before they start.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use smg_common::config::SourceSpec;
use smg_core::ProgressFn;
use std::collections::HashMap;
use std::sync::Arc;

/// Renders one progress bar per source during a generate run
pub struct ProgressReporter {
    bars: Arc<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    /// Create a bar for every source, in configuration order
    pub fn new(sources: &[SourceSpec]) -> Self {
        let multi = MultiProgress::new();
        let mut bars = HashMap::with_capacity(sources.len());

        for spec in sources {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(bar_style());
            bar.set_message(spec.name.clone());
            bars.insert(spec.name.clone(), bar);
        }

        // The bars keep the shared draw state alive; the MultiProgress
        // handle itself is no longer needed.
        Self {
            bars: Arc::new(bars),
        }
    }

    /// Callback handed to the orchestrator.
    ///
    /// The total is only known after the count query, so the bar length
    /// is set on first report and updated if the store total changes.
    pub fn callback(&self) -> ProgressFn {
        let bars = Arc::clone(&self.bars);
        Arc::new(move |source: &str, processed: u64, total: u64| {
            if let Some(bar) = bars.get(source) {
                if bar.length() != Some(total) {
                    bar.set_length(total);
                }
                bar.set_position(processed);
            }
        })
    }

    /// Finish every bar, leaving the final state on screen
    pub fn finish(&self) {
        for bar in self.bars.values() {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{msg:12} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}
