//! BatchPress - Load-Aware Batch Image Compressor
//!
//! Re-encodes every image in a directory (optionally its whole subtree) to
//! JPEG, PNG or WebP, with optional downscaling to a maximum width. Work runs
//! either serially or on a worker pool sized once from the current CPU load.
//!
//! # Guarantees
//!
//! - **One outcome per job**: every discovered image yields exactly one
//!   success or failure, in both execution modes
//! - **Failures are data**: a corrupt or unwritable image never aborts the run;
//!   it becomes a line in the error log
//! - **Whole log lines**: concurrent failures never interleave within a line
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batchpress::{BatchCompressor, CompressionOptions, OutputFormat, RunConfig};
//!
//! let options = CompressionOptions::new(80, true, 1024, OutputFormat::WebP)?;
//! let config = RunConfig::new("photos", "compressed")
//!     .recursive(true)
//!     .parallel(true)
//!     .options(options);
//!
//! let summary = BatchCompressor::new(config).run()?;
//! println!("{} compressed, {} failed", summary.succeeded, summary.failed);
//! # Ok::<(), batchpress::BatchError>(())
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use batch::{BatchCompressor, BatchSummary};
pub use config::{CompressionOptions, Config, LoggingConfig, OutputFormat, RunConfig};
pub use error::{BatchError, CompressionFailure, Result};
pub use parallel::{ExecutionMode, LoadSampler, StaticLoad, SystemLoad};
pub use processing::{CompressionEngine, ImageJob, JobOutcome, JobRunner, PathResolver};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize BatchPress with default settings
///
/// Installs a tracing subscriber filtered by `RUST_LOG` and logs what the
/// machine offers. Safe to call more than once; only the first subscriber
/// sticks.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .is_ok()
    {
        info!("BatchPress v{} initialized", VERSION);
    }

    validate_system_requirements()
}

/// Initialize with custom logging configuration
pub fn init_with_config(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&logging.level)
        .map_err(|e| BatchError::config(format!("Invalid log level '{}': {}", logging.level, e)))?;

    let installed = if logging.json_format {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };

    if installed {
        info!("BatchPress v{} initialized at level {}", VERSION, logging.level);
    }

    validate_system_requirements()
}

fn validate_system_requirements() -> Result<()> {
    let cpu_count = num_cpus::get();
    info!(
        "Detected {} logical CPUs ({} physical)",
        cpu_count,
        num_cpus::get_physical()
    );
    if cpu_count < 2 {
        warn!("Single CPU detected; --parallel will run with one worker");
    }

    info!(
        "Input formats: {}",
        processing::SUPPORTED_INPUT_EXTENSIONS.join(", ")
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init() {
        // Should not fail on multiple calls
        let _ = init();
        let _ = init();
    }

    #[test]
    fn test_init_rejects_bad_level() {
        let logging = LoggingConfig {
            level: "batchpress=loud".to_string(),
            json_format: false,
        };
        assert!(init_with_config(&logging).is_err());
    }

    #[test]
    fn test_system_validation() {
        assert!(validate_system_requirements().is_ok());
    }
}
