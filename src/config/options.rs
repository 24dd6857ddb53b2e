//! Compression options shared by every job of a run

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Default encoder quality
pub const DEFAULT_QUALITY: u8 = 80;

/// Default width limit applied when resizing is enabled
pub const DEFAULT_MAX_WIDTH: u32 = 1024;

/// Output formats the compressor can write
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Get file extension for this format
    ///
    /// The extension is the normalized format name, so JPEG output is
    /// written as `name.jpeg`.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            other => Err(BatchError::config(format!(
                "Unsupported output format '{}'. Choose one of: jpeg, png, webp",
                other
            ))),
        }
    }
}

/// Encoder settings, built once at startup and never mutated
///
/// Workers only ever see `&CompressionOptions`, which is what makes sharing
/// it across threads free of locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionOptions {
    quality: u8,
    resize: bool,
    max_width: u32,
    output_format: OutputFormat,
}

impl CompressionOptions {
    /// Create validated options
    pub fn new(quality: u8, resize: bool, max_width: u32, output_format: OutputFormat) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(BatchError::config(format!(
                "Quality must be between 1 and 100 (got {})",
                quality
            )));
        }
        if max_width == 0 {
            return Err(BatchError::config("Max width must be greater than 0"));
        }

        Ok(Self {
            quality,
            resize,
            max_width,
            output_format,
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn resize(&self) -> bool {
        self.resize
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            resize: false,
            max_width: DEFAULT_MAX_WIDTH,
            output_format: OutputFormat::Jpeg,
        }
    }
}
