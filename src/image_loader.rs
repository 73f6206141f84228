//! Image decoding and analysis-size normalisation
//!
//! The credit pipeline receives images as raw bytes already read by the caller.
//! This module decodes them with the `image` crate, converts to 8-bit RGB and
//! downscales anything larger than the configured limit.
//!
//! ## Design
//!
//! Downscaling uses Lanczos3 into a fixed bounding box while preserving the
//! aspect ratio. It is lossy but deterministic: the same bytes always produce
//! the same analysis pixels.

use crate::config::ImageConfig;
use crate::error::{AnalysisError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use log::debug;

/// Decoded image ready for analysis
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// RGB pixels at analysis resolution
    pub pixels: RgbImage,
    /// Detected container format
    pub format: ImageFormat,
    /// Dimensions before downscaling
    pub original_width: u32,
    pub original_height: u32,
    /// Whether the image was downscaled
    pub downscaled: bool,
}

/// Decode image bytes and prepare them for analysis
///
/// # Arguments
///
/// * `bytes` - Encoded image (PNG, JPEG, WebP, TIFF, ...)
/// * `config` - Downscaling limits
///
/// # Errors
///
/// Returns `AnalysisError::ImageLoadError` if the format is not recognised or
/// decoding fails, and `AnalysisError::EmptyImage` for zero-sized images.
///
/// # Example
///
/// ```rust,no_run
/// use blue_carbon_credits::{config::ImageConfig, image_loader::load_image_bytes};
///
/// let bytes = std::fs::read("site_before.jpg").unwrap();
/// let image = load_image_bytes(&bytes, &ImageConfig::default())?;
/// println!("Analysing {}x{}", image.pixels.width(), image.pixels.height());
/// # Ok::<(), blue_carbon_credits::AnalysisError>(())
/// ```
pub fn load_image_bytes(bytes: &[u8], config: &ImageConfig) -> Result<LoadedImage> {
    if bytes.is_empty() {
        return Err(AnalysisError::ImageLoadError {
            message: "Image data is empty".to_string(),
            source: None,
        });
    }

    let format = image::guess_format(bytes)
        .map_err(|e| AnalysisError::image_load("Unrecognised image format", e))?;

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| AnalysisError::image_load(format!("Failed to decode {:?} image", format), e))?;

    let (original_width, original_height) = (decoded.width(), decoded.height());
    if original_width == 0 || original_height == 0 {
        return Err(AnalysisError::EmptyImage {
            width: original_width,
            height: original_height,
        });
    }

    let (pixels, downscaled) = prepare_for_analysis(decoded, config);
    debug!(
        "Decoded {:?} image {}x{} -> {}x{}",
        format,
        original_width,
        original_height,
        pixels.width(),
        pixels.height()
    );

    Ok(LoadedImage {
        pixels,
        format,
        original_width,
        original_height,
        downscaled,
    })
}

/// Convert to RGB8, downscaling when either side exceeds the limit
pub fn prepare_for_analysis(image: DynamicImage, config: &ImageConfig) -> (RgbImage, bool) {
    downscale_to(
        image,
        config.max_dimension,
        config.resize_width,
        config.resize_height,
    )
}

/// Downscale into a `width`x`height` box if either side exceeds `limit`
///
/// The aspect ratio is kept, so a non-4:3 photo fills only one side of the
/// box and coverage percentages are measured on undistorted pixels.
pub(crate) fn downscale_to(
    image: DynamicImage,
    limit: u32,
    width: u32,
    height: u32,
) -> (RgbImage, bool) {
    if image.width() > limit || image.height() > limit {
        let resized = image.resize(width, height, FilterType::Lanczos3);
        (resized.to_rgb8(), true)
    } else {
        (image.to_rgb8(), false)
    }
}

/// Get list of all supported file extensions
pub fn supported_extensions() -> &'static [&'static str] {
    &[
        "jpg", "jpeg", "png", "gif", "webp", "tiff", "tif", "bmp", "ico", "tga", "pbm", "pgm",
        "ppm", "pnm", "qoi",
    ]
}

/// Check if a file extension is supported
pub fn is_supported_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    supported_extensions().contains(&ext_lower.as_str())
}
