//! Configuration management for BatchPress

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

pub mod options;
pub use options::*;

/// Default location of the append-only failure log
pub const DEFAULT_ERROR_LOG: &str = "error_log.txt";

/// Optional configuration file contents
///
/// Every section and field may be omitted; command line flags are applied
/// on top of whatever the file provides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Encoder defaults
    pub compression: CompressionConfig,

    /// Discovery and scheduling defaults
    pub run: RunSection,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Encoder section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub quality: u8,
    pub resize: bool,
    pub max_width: u32,
    pub output_format: OutputFormat,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            resize: false,
            max_width: DEFAULT_MAX_WIDTH,
            output_format: OutputFormat::Jpeg,
        }
    }
}

/// Run section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub recursive: bool,
    pub break_structure: bool,
    pub parallel: bool,
    pub error_log: PathBuf,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            recursive: false,
            break_structure: false,
            parallel: false,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            BatchError::config(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;

        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let config: Config = match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            _ => {
                return Err(BatchError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.compression.to_options().map(|_| ())
    }
}

impl CompressionConfig {
    /// Build validated options from this section
    pub fn to_options(&self) -> Result<CompressionOptions> {
        CompressionOptions::new(self.quality, self.resize, self.max_width, self.output_format)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub recursive: bool,
    /// Put every output directly in `output_root` (`--break_structure`)
    pub flatten: bool,
    pub parallel: bool,
    pub error_log: PathBuf,
    pub options: CompressionOptions,
}

impl RunConfig {
    /// Serial, non-recursive run with default options
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_root: P, output_root: Q) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            recursive: false,
            flatten: false,
            parallel: false,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            options: CompressionOptions::default(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn error_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.error_log = path.into();
        self
    }

    pub fn options(mut self, options: CompressionOptions) -> Self {
        self.options = options;
        self
    }
}
