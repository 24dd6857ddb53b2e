//! Append-only record of failed jobs

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::processing::JobOutcome;

/// Process-wide failure log, one `input_path :: byte_size :: cause` line per
/// failed job
///
/// The file is opened in append mode on the first failure, so a run without
/// failures never creates it. Lines are written whole while holding the
/// lock; concurrent workers cannot interleave within a line.
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ErrorLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format one log line (without the trailing newline)
    pub fn format_line(input_path: &Path, byte_size: u64, cause: &str) -> String {
        // keep one record per line even if the cause spans several
        let cause = cause.replace(['\r', '\n'], " ");
        format!("{} :: {} :: {}", input_path.display(), byte_size, cause)
    }

    /// Append the failure to the log; successes are ignored
    ///
    /// A log that cannot be written is reported through tracing and does not
    /// affect the job's outcome.
    pub fn record(&self, outcome: &JobOutcome) {
        let JobOutcome::Failure {
            input_path,
            byte_size,
            cause,
            ..
        } = outcome
        else {
            return;
        };

        let mut line = Self::format_line(input_path, *byte_size, cause);
        line.push('\n');

        if let Err(e) = self.append(line.as_bytes()) {
            warn!("Could not write to error log {:?}: {}", self.path, e);
        }
    }

    fn append(&self, line: &[u8]) -> std::io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            *guard = Some(file);
        }

        match guard.as_mut() {
            Some(file) => file.write_all(line),
            None => Ok(()),
        }
    }
}
