//! End-to-end batch runs
//!
//! [`BatchCompressor`] ties discovery, pool sizing, scheduling, progress and
//! the error log together for one run over an input tree.

use std::fs;
use std::path::PathBuf;

use console::style;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{BatchError, ErrorContext, Result};
use crate::parallel::{
    scheduler_for, size_pool, Dispatch, ErrorLog, ExecutionMode, LoadSampler, ProgressReporter, RunPhase,
    SystemLoad,
};
use crate::processing::{CompressionEngine, ImageJob, JobOutcome, JobRunner, PathResolver, ResolvedPath};

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    pub workers: usize,
    pub mode: &'static str,
    /// Set only when at least one job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<PathBuf>,
}

impl BatchSummary {
    fn empty(parallel: bool) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            elapsed_secs: 0.0,
            workers: 0,
            mode: if parallel { "parallel" } else { "serial" },
            error_log: None,
        }
    }

    /// Nothing was discovered, so nothing ran
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn files_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.total as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BatchError::Serde(e.to_string()))
    }

    /// Print the human-readable summary to stdout
    pub fn print(&self) {
        if self.is_empty() {
            println!("No images found in the input folder.");
            return;
        }

        println!();
        println!("{}", style("Compression Summary:").bold());
        println!("  {}: {}", style("Processed").green(), self.succeeded);
        if self.failed > 0 {
            println!("  {}: {}", style("Failed").red(), self.failed);
        }
        println!("  {}: {:.2}s", style("Duration").blue(), self.elapsed_secs);
        println!(
            "  {}: {} ({} workers)",
            style("Mode").cyan(),
            self.mode,
            self.workers
        );
        println!("  {}: {:.1} files/sec", style("Speed").cyan(), self.files_per_second());

        if let Some(log) = &self.error_log {
            println!("  {}: {}", style("Error log").yellow(), log.display());
        }
    }
}

/// Runs one batch described by a [`RunConfig`]
pub struct BatchCompressor {
    config: RunConfig,
    show_progress: bool,
}

impl BatchCompressor {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while running
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn resolver(&self) -> PathResolver {
        PathResolver::new(
            &self.config.input_root,
            &self.config.output_root,
            self.config.options.output_format().extension(),
        )
        .recursive(self.config.recursive)
        .flatten(self.config.flatten)
    }

    /// Resolve input/output pairs without touching the output tree
    pub fn plan(&self) -> Result<Vec<ResolvedPath>> {
        self.resolver().discover()
    }

    /// Run with the live system load reading
    pub fn run(&self) -> Result<BatchSummary> {
        self.run_with_load(&SystemLoad)
    }

    /// Run with a given load sampler for pool sizing
    pub fn run_with_load(&self, sampler: &dyn LoadSampler) -> Result<BatchSummary> {
        let engine = CompressionEngine::new(self.config.options.clone());
        self.run_with(&engine, sampler)
    }

    /// Run with a custom job runner in place of the compression engine
    pub fn run_with(&self, runner: &dyn JobRunner, sampler: &dyn LoadSampler) -> Result<BatchSummary> {
        debug!("Entering {} phase", RunPhase::Idle);

        let paths = self.plan()?;
        fs::create_dir_all(&self.config.output_root).with_output_dir(self.config.output_root.clone())?;

        if paths.is_empty() {
            info!("No images found under {:?}", self.config.input_root);
            return Ok(BatchSummary::empty(self.config.parallel));
        }

        let jobs = ImageJob::from_resolved(paths);
        info!("Found {} images. Starting compression...", jobs.len());

        let mode = size_pool(self.config.parallel, sampler);
        let progress = if self.show_progress {
            ProgressReporter::visible(jobs.len() as u64)
        } else {
            ProgressReporter::new(jobs.len() as u64)
        };
        let errors = ErrorLog::new(&self.config.error_log);
        let dispatch = Dispatch::new(runner, &errors, &progress);

        let outcomes = scheduler_for(mode).run(jobs, &dispatch)?;
        let state = progress.finish();

        Ok(summarize(&outcomes, mode, state.elapsed.as_secs_f64(), &errors))
    }
}

fn summarize(outcomes: &[JobOutcome], mode: ExecutionMode, elapsed_secs: f64, errors: &ErrorLog) -> BatchSummary {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.len() - succeeded;

    BatchSummary {
        total: outcomes.len(),
        succeeded,
        failed,
        elapsed_secs,
        // the pool never spawns more workers than there are jobs
        workers: mode.workers().min(outcomes.len()),
        mode: mode.label(),
        error_log: (failed > 0).then(|| errors.path().to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::StaticLoad;
    use image::RgbImage;
    use tempfile::TempDir;

    const IDLE_MACHINE: StaticLoad = StaticLoad {
        cpus: 4,
        load_percent: 10.0,
    };

    #[test]
    fn test_missing_input_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let compressor = BatchCompressor::new(RunConfig::new(dir.path().join("missing"), dir.path().join("out")));

        let err = compressor.run_with_load(&IDLE_MACHINE).unwrap_err();
        assert!(err.is_setup());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_empty_input_creates_only_output_root() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        let config = RunConfig::new(&input, dir.path().join("out")).error_log(dir.path().join("errors.txt"));

        let summary = BatchCompressor::new(config).run_with_load(&IDLE_MACHINE).unwrap();

        assert!(summary.is_empty());
        assert!(dir.path().join("out").is_dir());
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
        assert!(!dir.path().join("errors.txt").exists());
    }

    #[test]
    fn test_summary_counts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        fs::create_dir(&input).unwrap();
        RgbImage::new(16, 16).save(input.join("ok.png")).unwrap();
        fs::write(input.join("broken.gif"), b"GIF89a-truncated").unwrap();

        let log = dir.path().join("errors.txt");
        let config = RunConfig::new(&input, dir.path().join("out"))
            .parallel(true)
            .error_log(&log);

        let summary = BatchCompressor::new(config).run_with_load(&IDLE_MACHINE).unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.mode, "parallel");
        // sized to three workers, capped by the two jobs
        assert_eq!(summary.workers, 2);
        assert_eq!(summary.error_log.as_deref(), Some(log.as_path()));
        assert!(dir.path().join("out/ok.jpeg").is_file());
    }

    #[test]
    fn test_summary_json() {
        let summary = BatchSummary::empty(false);
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

        assert_eq!(json["total"], 0);
        assert_eq!(json["mode"], "serial");
        assert!(json.get("error_log").is_none());
    }
}
