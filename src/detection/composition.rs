//! Land composition and texture analysis
//!
//! Measures auxiliary signals for a single image:
//! - Exposed soil/sand fraction (brown/tan HSV window)
//! - Open water fraction (blue HSV window)
//! - Texture complexity from the 9-tap Laplacian response of the luma channel
//! - Mean per-channel color variance
//!
//! Soil and water are measured independently of the vegetation mask and of
//! each other, so the fractions may overlap or leave pixels unassigned.

use crate::color::ColorConverter;
use crate::constants::composition::{
    LAPLACIAN_DERIVATIVE_KERNEL, LAPLACIAN_SMOOTHING_KERNEL, SOIL_HUE_MAX, SOIL_HUE_MIN,
    SOIL_MIN_SATURATION, WATER_HUE_MAX, WATER_HUE_MIN, WATER_MIN_SATURATION,
};
use crate::error::{AnalysisError, Result};
use image::RgbImage;

/// Composition analysis result
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionResult {
    /// Soil/sand pixels, 0-100
    pub soil_percentage: f64,
    /// Water pixels, 0-100
    pub water_percentage: f64,
    /// Variance of the 9-tap Laplacian response
    pub laplacian_variance: f64,
    /// Standard deviation of the Laplacian response
    pub texture_complexity: f64,
    /// Mean of the per-channel pixel variances
    pub color_variance: f64,
}

impl CompositionResult {
    /// Result used when composition analysis could not run
    pub fn empty() -> Self {
        Self {
            soil_percentage: 0.0,
            water_percentage: 0.0,
            laplacian_variance: 0.0,
            texture_complexity: 0.0,
            color_variance: 0.0,
        }
    }
}

/// Composition analyzer for soil, water and texture
#[derive(Debug, Clone, Default)]
pub struct CompositionAnalyzer {
    converter: ColorConverter,
}

impl CompositionAnalyzer {
    pub fn new() -> Self {
        Self {
            converter: ColorConverter::new(),
        }
    }

    /// Analyze the composition of an RGB image
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::EmptyImage` if the image has no pixels.
    pub fn analyze(&self, image: &RgbImage) -> Result<CompositionResult> {
        let total_pixels = (image.width() as usize) * (image.height() as usize);
        if total_pixels == 0 {
            return Err(AnalysisError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }

        let mut soil_pixels = 0usize;
        let mut water_pixels = 0usize;

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let hsv = self.converter.rgb_to_hsv8(r, g, b);

            if hsv.hue >= SOIL_HUE_MIN && hsv.hue <= SOIL_HUE_MAX && hsv.saturation > SOIL_MIN_SATURATION {
                soil_pixels += 1;
            }
            if hsv.hue >= WATER_HUE_MIN && hsv.hue <= WATER_HUE_MAX && hsv.saturation > WATER_MIN_SATURATION {
                water_pixels += 1;
            }
        }

        let laplacian_variance = self.laplacian_variance(image);

        Ok(CompositionResult {
            soil_percentage: soil_pixels as f64 / total_pixels as f64 * 100.0,
            water_percentage: water_pixels as f64 / total_pixels as f64 * 100.0,
            laplacian_variance,
            texture_complexity: laplacian_variance.sqrt(),
            color_variance: self.color_variance(image),
        })
    }

    /// Variance of the Laplacian of the 8-bit luma channel
    ///
    /// The Laplacian is the sum of the 9-tap second derivatives along x and
    /// y, each smoothed across the other axis, with borders mirrored without
    /// repeating the edge pixel. Textured photos respond in the thousands.
    fn laplacian_variance(&self, image: &RgbImage) -> f64 {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let luma: Vec<f64> = image
            .pixels()
            .map(|p| self.converter.luma(p[0], p[1], p[2]).round())
            .collect();

        let dxx = separable_filter(
            &luma,
            width,
            height,
            &LAPLACIAN_DERIVATIVE_KERNEL,
            &LAPLACIAN_SMOOTHING_KERNEL,
        );
        let dyy = separable_filter(
            &luma,
            width,
            height,
            &LAPLACIAN_SMOOTHING_KERNEL,
            &LAPLACIAN_DERIVATIVE_KERNEL,
        );

        let responses: Vec<f64> = dxx.iter().zip(&dyy).map(|(x, y)| x + y).collect();
        variance(&responses)
    }

    /// Mean over R, G, B of each channel's variance
    fn color_variance(&self, image: &RgbImage) -> f64 {
        (0..3)
            .map(|channel| {
                let values: Vec<f64> = image.pixels().map(|p| p[channel] as f64).collect();
                variance(&values)
            })
            .sum::<f64>()
            / 3.0
    }
}

/// Correlate a row-major plane with `horizontal` then `vertical`
fn separable_filter(
    values: &[f64],
    width: usize,
    height: usize,
    horizontal: &[f64],
    vertical: &[f64],
) -> Vec<f64> {
    let h_radius = (horizontal.len() / 2) as isize;
    let mut rows = vec![0.0; values.len()];
    for y in 0..height {
        let row = &values[y * width..(y + 1) * width];
        for x in 0..width {
            rows[y * width + x] = horizontal
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[reflect_101(x as isize + k as isize - h_radius, width)])
                .sum();
        }
    }

    let v_radius = (vertical.len() / 2) as isize;
    let mut filtered = vec![0.0; values.len()];
    for y in 0..height {
        for x in 0..width {
            filtered[y * width + x] = vertical
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    w * rows[reflect_101(y as isize + k as isize - v_radius, height) * width + x]
                })
                .sum();
        }
    }
    filtered
}

/// Mirror an out-of-range index back into `0..len` (`gfedcb|abcdefgh|gfedcba`)
fn reflect_101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded < len as isize {
        folded as usize
    } else {
        (period - folded) as usize
    }
}

/// Population variance, 0 for empty input
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_uniform_soil() {
        let image = RgbImage::from_pixel(10, 10, Rgb([150, 100, 50]));
        let result = CompositionAnalyzer::new().analyze(&image).unwrap();

        assert_eq!(result.soil_percentage, 100.0);
        assert_eq!(result.water_percentage, 0.0);
        assert_eq!(result.laplacian_variance, 0.0);
        assert_eq!(result.color_variance, 0.0);
    }

    #[test]
    fn test_water_fraction() {
        let image = RgbImage::from_fn(10, 10, |x, _| {
            if x < 3 { Rgb([30, 100, 200]) } else { Rgb([128, 128, 128]) }
        });
        let result = CompositionAnalyzer::new().analyze(&image).unwrap();

        assert!((result.water_percentage - 30.0).abs() < 1e-9);
        assert_eq!(result.soil_percentage, 0.0);
    }

    /// Forest green with a deterministic ±12 per-pixel brightness jitter
    fn noisy_forest(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let hash = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503))
                .wrapping_mul(2_246_822_519)
                >> 16;
            let jitter = (hash % 25) as i32 - 12;
            let shift = |c: u8| (c as i32 + jitter).clamp(0, 255) as u8;
            Rgb([shift(34), shift(139), shift(34)])
        })
    }

    #[test]
    fn test_texture_increases_with_edges() {
        let analyzer = CompositionAnalyzer::new();
        let flat = RgbImage::from_pixel(12, 12, Rgb([90, 90, 90]));
        let step = RgbImage::from_fn(12, 12, |x, _| {
            if x < 6 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });

        let flat_result = analyzer.analyze(&flat).unwrap();
        let step_result = analyzer.analyze(&step).unwrap();

        assert_eq!(flat_result.texture_complexity, 0.0);
        assert!(step_result.texture_complexity > 100.0);
        assert!(step_result.color_variance > 10_000.0);
    }

    #[test]
    fn test_noisy_vegetation_texture_scale() {
        let result = CompositionAnalyzer::new().analyze(&noisy_forest(200, 150)).unwrap();

        // Mild sensor-level noise already responds far above the 100 used
        // to normalise texture in the confidence blend
        assert!(result.texture_complexity > 1_000.0, "texture {}", result.texture_complexity);
        let squared = result.texture_complexity.powi(2);
        assert!((squared - result.laplacian_variance).abs() < 1e-6 * result.laplacian_variance);
    }

    #[test]
    fn test_laplacian_kernel_response() {
        // A single bright pixel on black: the centre tap of both second
        // derivatives is -10 * 70, so the centre response is -1400 * value
        let analyzer = CompositionAnalyzer::new();
        let image = RgbImage::from_fn(21, 21, |x, y| {
            if x == 10 && y == 10 { Rgb([100, 100, 100]) } else { Rgb([0, 0, 0]) }
        });
        let luma: Vec<f64> = image.pixels().map(|p| p[0] as f64).collect();
        let dxx = separable_filter(&luma, 21, 21, &LAPLACIAN_DERIVATIVE_KERNEL, &LAPLACIAN_SMOOTHING_KERNEL);
        let dyy = separable_filter(&luma, 21, 21, &LAPLACIAN_SMOOTHING_KERNEL, &LAPLACIAN_DERIVATIVE_KERNEL);

        assert_eq!(dxx[10 * 21 + 10] + dyy[10 * 21 + 10], -140_000.0);
        assert!(analyzer.analyze(&image).unwrap().texture_complexity > 0.0);
    }

    #[test]
    fn test_reflect_101_borders() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-3, 1), 0);
    }

    #[test]
    fn test_variance_helper() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[2.0, 4.0]), 1.0);
    }
}
