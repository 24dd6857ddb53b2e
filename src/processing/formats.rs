//! Input format filtering and in-memory output encoding

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

use crate::config::{CompressionOptions, OutputFormat};
use crate::error::CompressionFailure;

/// File name endings picked up by discovery
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "gif", "bmp"];

/// Check if a path names a supported input file
///
/// Matches on how the lowercase file name ends, not on `Path::extension`,
/// so `.jpg` and `scanjpg` are picked up too.
pub fn is_supported_input_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .map(|name| {
            let name = name.to_string_lossy().to_ascii_lowercase();
            SUPPORTED_INPUT_EXTENSIONS.iter().any(|ext| name.ends_with(*ext))
        })
        .unwrap_or(false)
}

/// Encode an image into memory in the configured format
///
/// Encoding fully before touching the filesystem keeps each job to a single
/// write of the finished bytes.
pub fn encode(image: &DynamicImage, options: &CompressionOptions) -> Result<Vec<u8>, CompressionFailure> {
    let mut bytes = Vec::new();

    match options.output_format() {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, options.quality());
            image.write_with_encoder(encoder)
        }
        OutputFormat::Png => {
            // PNG is lossless; quality has no effect beyond picking the
            // strongest deflate setting
            let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive);
            image.write_with_encoder(encoder)
        }
        OutputFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut bytes);
            image.write_with_encoder(encoder)
        }
    }
    .map_err(CompressionFailure::Encode)?;

    Ok(bytes)
}
