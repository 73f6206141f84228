//! Vegetation detection from RGB imagery
//!
//! Implements multi color-space vegetation detection that:
//! - Approximates NDVI per pixel from RGB, using green plus a share of blue as
//!   the near-infrared proxy
//! - Flags green pixels with an HSV hue/saturation/value window
//! - Flags green-leaning pixels with the Lab a* channel
//! - Combines both masks with a logical OR into a coverage percentage

use crate::color::ColorConverter;
use crate::config::VegetationConfig;
use crate::error::{AnalysisError, Result};
use image::RgbImage;

/// Per-pixel NDVI approximation, row-major, values in `[-1, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct NdviField {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl NdviField {
    /// Compute the NDVI approximation for every pixel
    ///
    /// `ndvi = (nir - red) / (nir + red)` with `nir = green + nir_blue_weight * blue`.
    /// A zero denominator is replaced by 1, so black pixels map to 0.
    pub fn from_image(image: &RgbImage, nir_blue_weight: f64) -> Self {
        let values = image
            .pixels()
            .map(|p| ndvi_pixel(p[0], p[1], p[2], nir_blue_weight))
            .collect();

        Self {
            width: image.width(),
            height: image.height(),
            values,
        }
    }

    /// Build a field from precomputed values
    pub fn from_values(width: u32, height: u32, values: Vec<f64>) -> Result<Self> {
        if values.len() != (width as usize) * (height as usize) {
            return Err(AnalysisError::invalid_parameter(
                "ndvi_values",
                format!("{} values for {}x{}", values.len(), width, height),
            ));
        }
        Ok(Self {
            width,
            height,
            values: values.into_iter().map(|v| v.clamp(-1.0, 1.0)).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[inline]
fn ndvi_pixel(r: u8, g: u8, b: u8, nir_blue_weight: f64) -> f64 {
    let red = r as f64;
    let nir = g as f64 + b as f64 * nir_blue_weight;
    let denominator = nir + red;
    let denominator = if denominator == 0.0 { 1.0 } else { denominator };
    ((nir - red) / denominator).clamp(-1.0, 1.0)
}

/// Vegetation detection result for one image
#[derive(Debug, Clone)]
pub struct VegetationDetection {
    /// Combined-mask coverage, 0-100
    pub vegetation_percentage: f64,
    /// Pixels in the combined mask
    pub vegetation_pixels: usize,
    /// Pixels matched by the HSV window alone
    pub hsv_pixels: usize,
    /// Pixels matched by the Lab a* test alone
    pub lab_pixels: usize,
    /// Pixels analysed
    pub total_pixels: usize,
    /// NDVI approximation for the same pixels
    pub ndvi: NdviField,
}

/// Vegetation detector combining HSV, Lab and NDVI heuristics
pub struct VegetationDetector {
    converter: ColorConverter,
    config: VegetationConfig,
}

impl Default for VegetationDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VegetationDetector {
    /// Create a new vegetation detector with default thresholds
    pub fn new() -> Self {
        Self::with_config(VegetationConfig::default())
    }

    /// Create a vegetation detector with custom thresholds
    pub fn with_config(config: VegetationConfig) -> Self {
        Self {
            converter: ColorConverter::new(),
            config,
        }
    }

    /// Detect vegetation in an RGB image
    ///
    /// # Arguments
    ///
    /// * `image` - RGB image at analysis resolution
    ///
    /// # Returns
    ///
    /// `VegetationDetection` with coverage percentage and NDVI field
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::EmptyImage` if the image has no pixels.
    pub fn detect(&self, image: &RgbImage) -> Result<VegetationDetection> {
        let total_pixels = (image.width() as usize) * (image.height() as usize);
        if total_pixels == 0 {
            return Err(AnalysisError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }

        let cfg = &self.config;
        let mut vegetation_pixels = 0usize;
        let mut hsv_pixels = 0usize;
        let mut lab_pixels = 0usize;

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;

            let hsv = self.converter.rgb_to_hsv8(r, g, b);
            let hsv_match = hsv.in_window(cfg.hue_min, cfg.hue_max, cfg.min_saturation, cfg.min_value);
            let lab_match = self.converter.lab_a8(r, g, b) < cfg.lab_neutral_a;

            hsv_pixels += hsv_match as usize;
            lab_pixels += lab_match as usize;
            vegetation_pixels += (hsv_match || lab_match) as usize;
        }

        let ndvi = NdviField::from_image(image, cfg.nir_blue_weight);
        let vegetation_percentage = vegetation_pixels as f64 / total_pixels as f64 * 100.0;

        Ok(VegetationDetection {
            vegetation_percentage,
            vegetation_pixels,
            hsv_pixels,
            lab_pixels,
            total_pixels,
            ndvi,
        })
    }
}
