//! Error types and handling for BatchPress
//!
//! Two families live here. [`BatchError`] is fatal: it aborts a run before
//! or while the worker pool starts. [`CompressionFailure`] belongs to a
//! single job and is turned into data at the engine boundary, so it never
//! unwinds through the scheduler.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for BatchPress operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Fatal errors that abort a whole run
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input root missing or not a directory
    #[error("Input folder '{}' does not exist or is not a directory", .path.display())]
    InputNotFound { path: PathBuf },

    /// Output root could not be created
    #[error("Cannot create output folder '{}': {source}", .path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Worker pool failed to start or lost its workers
    #[error("Scheduling error: {message}")]
    Scheduling { message: String },

    /// Invalid option values or config file contents
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(String),

    /// I/O errors outside of a job
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Create a new input-not-found error
    pub fn input_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Create a new scheduling error
    pub fn scheduling<S: Into<String>>(message: S) -> Self {
        Self::Scheduling {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the error was raised before any job could run
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. } | Self::OutputDirectory { .. } | Self::Config { .. }
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InputNotFound { path } => {
                format!("Error: Input folder '{}' does not exist or is not a directory.", path.display())
            }
            Self::Scheduling { message } => {
                format!("Could not run the worker pool ({}). Try again without --parallel.", message)
            }
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for BatchError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serde(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for BatchError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serde(format!("YAML parsing error: {}", err))
    }
}

/// Why a single job failed
///
/// Every variant is recovered: the job becomes a `Failure` outcome plus one
/// error-log line, and the run continues.
#[derive(Debug, Error)]
pub enum CompressionFailure {
    /// Input could not be opened or read
    #[error("cannot read input: {0}")]
    Read(#[source] std::io::Error),

    /// Corrupt or unsupported image content
    #[error("cannot identify image file: {0}")]
    Decode(#[source] image::ImageError),

    /// Encoder rejected the image or parameters
    #[error("cannot encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// Output could not be written (disk full, permissions, ...)
    #[error("cannot write output: {0}")]
    Write(#[source] std::io::Error),

    /// Decoder or encoder panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl CompressionFailure {
    /// True for the decode class of failures (input side)
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Decode(_))
    }
}

/// Error context extension for adding file path information
pub trait ErrorContext<T> {
    /// Map an I/O failure while creating `path` into an output-directory error
    fn with_output_dir(self, path: PathBuf) -> Result<T>;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn with_output_dir(self, path: PathBuf) -> Result<T> {
        self.map_err(|source| BatchError::OutputDirectory { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BatchError::config("test message");
        assert!(matches!(err, BatchError::Config { .. }));
        assert!(err.is_setup());
        assert!(!BatchError::scheduling("no threads").is_setup());
    }

    #[test]
    fn test_user_messages() {
        let err = BatchError::input_not_found("missing_dir");
        let msg = err.user_message();
        assert!(msg.contains("missing_dir"));
        assert!(msg.contains("does not exist"));
    }

    #[test]
    fn test_failure_classes() {
        let read = CompressionFailure::Read(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(read.is_decode());

        let write = CompressionFailure::Write(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(!write.is_decode());
        assert!(write.to_string().starts_with("cannot write output"));
    }

    #[test]
    fn test_output_dir_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        let err = result.with_output_dir(Path::new("out").to_path_buf()).unwrap_err();

        assert!(matches!(err, BatchError::OutputDirectory { .. }));
        assert!(err.to_string().contains("out"));
    }
}
