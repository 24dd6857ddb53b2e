//! Width-capped resize policy

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::config::CompressionOptions;

/// Target dimensions for a width-capped resize
///
/// Returns `None` when the source already fits. Otherwise the width becomes
/// `max_width` and the height is `round(max_width * height / width)`, never
/// less than one pixel.
pub fn resized_dimensions(width: u32, height: u32, max_width: u32) -> Option<(u32, u32)> {
    if width <= max_width || width == 0 {
        return None;
    }

    let scaled = u64::from(max_width) * u64::from(height);
    let width = u64::from(width);
    // round half up in integer arithmetic
    let new_height = (scaled + width / 2) / width;

    Some((max_width, new_height.max(1) as u32))
}

/// Apply the resize policy from `options` to an image
pub fn apply_resize(image: DynamicImage, options: &CompressionOptions) -> DynamicImage {
    if !options.resize() {
        return image;
    }

    match resized_dimensions(image.width(), image.height(), options.max_width()) {
        Some((width, height)) => {
            debug!(
                "Resizing {}x{} -> {}x{}",
                image.width(),
                image.height(),
                width,
                height
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        }
        None => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use image::RgbImage;

    #[test]
    fn test_resized_dimensions() {
        assert_eq!(resized_dimensions(1600, 900, 800), Some((800, 450)));
        assert_eq!(resized_dimensions(3000, 2000, 1024), Some((1024, 683)));
        assert_eq!(resized_dimensions(1025, 1, 1024), Some((1024, 1)));
    }

    #[test]
    fn test_no_resize_when_narrow_enough() {
        assert_eq!(resized_dimensions(800, 600, 800), None);
        assert_eq!(resized_dimensions(640, 4000, 1024), None);
    }

    #[test]
    fn test_apply_resize_respects_flag() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1600, 900));

        let disabled = CompressionOptions::new(80, false, 800, OutputFormat::Jpeg).unwrap();
        let untouched = apply_resize(image.clone(), &disabled);
        assert_eq!((untouched.width(), untouched.height()), (1600, 900));

        let enabled = CompressionOptions::new(80, true, 800, OutputFormat::Jpeg).unwrap();
        let resized = apply_resize(image, &enabled);
        assert_eq!((resized.width(), resized.height()), (800, 450));
    }
}
