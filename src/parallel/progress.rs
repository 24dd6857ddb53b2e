//! Progress tracking for batch runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::processing::JobOutcome;

/// Counts completion signals and renders `completed/total`
///
/// Outcomes may arrive in any index order; the reporter only counts. Each
/// call does an atomic increment and a progress-bar tick, nothing that can
/// hold up the scheduler.
pub struct ProgressReporter {
    total: u64,
    completed: AtomicU64,
    failed: AtomicU64,
    bar: ProgressBar,
    started: Instant,
}

/// Snapshot of the counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl ProgressReporter {
    /// Reporter without any terminal output
    pub fn new(total: u64) -> Self {
        Self::with_bar(total, ProgressBar::hidden())
    }

    /// Reporter drawing a progress bar on stderr
    pub fn visible(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message("Compressing");

        Self::with_bar(total, bar)
    }

    fn with_bar(total: u64, bar: ProgressBar) -> Self {
        info!("Started progress tracking for {} files", total);
        Self {
            total,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bar,
            started: Instant::now(),
        }
    }

    /// Record one completion signal
    pub fn record(&self, outcome: &JobOutcome) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if !outcome.is_success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.inc(1);

        debug!(
            "Job {} finished ({}): {}/{}",
            outcome.job_index(),
            if outcome.is_success() { "ok" } else { "failed" },
            completed,
            self.total
        );
    }

    /// Jobs finished so far, successful or not
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// `completed/total`
    pub fn render(&self) -> String {
        format!("{}/{}", self.completed(), self.total)
    }

    pub fn state(&self) -> ProgressState {
        ProgressState {
            total: self.total,
            completed: self.completed(),
            failed: self.failed(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Stop drawing and log the final count
    pub fn finish(&self) -> ProgressState {
        let state = self.state();
        self.bar.finish_with_message("Compression complete!");

        info!(
            "Batch finished: {} ({} ok, {} failed) in {:.2}s, {:.1} files/sec",
            self.render(),
            state.succeeded(),
            state.failed,
            state.elapsed.as_secs_f64(),
            state.files_per_second()
        );
        state
    }
}

impl ProgressState {
    pub fn succeeded(&self) -> u64 {
        self.completed - self.failed
    }

    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn failure(job_index: usize) -> JobOutcome {
        JobOutcome::Failure {
            job_index,
            input_path: PathBuf::from("bad.jpg"),
            byte_size: 12,
            cause: "cannot identify image file".to_string(),
        }
    }

    #[test]
    fn test_progress_counts() {
        let reporter = ProgressReporter::new(4);
        assert_eq!(reporter.render(), "0/4");

        reporter.record(&JobOutcome::Success { job_index: 2 });
        reporter.record(&failure(0));
        reporter.record(&JobOutcome::Success { job_index: 1 });

        assert_eq!(reporter.render(), "3/4");
        assert_eq!(reporter.failed(), 1);

        let state = reporter.finish();
        assert_eq!(state.succeeded(), 2);
        assert_eq!(state.total, 4);
    }

    #[test]
    fn test_concurrent_recording() {
        let reporter = Arc::new(ProgressReporter::new(400));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let reporter = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let index = worker * 100 + i;
                        if index % 10 == 0 {
                            reporter.record(&failure(index));
                        } else {
                            reporter.record(&JobOutcome::Success { job_index: index });
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(reporter.render(), "400/400");
        assert_eq!(reporter.failed(), 40);
    }

    #[test]
    fn test_empty_batch_rate() {
        let state = ProgressReporter::new(0).state();
        assert_eq!(state.completed, 0);
        assert_eq!(state.files_per_second(), 0.0);
    }
}
