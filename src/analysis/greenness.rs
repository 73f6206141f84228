//! Green-progress analysis
//!
//! A deliberately simple second opinion on vegetation change: the share of
//! green pixels in each image (two HSV windows, bright and dark greens) and a
//! stepped multiplier over the difference. It is reported alongside the credit
//! calculation for audit and does not feed the credit math.

use crate::constants::processing::{
    GREENNESS_MAX_DIMENSION, GREENNESS_RESIZE_HEIGHT, GREENNESS_RESIZE_WIDTH,
};
use crate::color::ColorConverter;
use crate::error::{AnalysisError, Result};
use crate::image_loader::downscale_to;
use image::{DynamicImage, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive green hue window (8-bit hue)
const GREEN_HUE_MIN: u8 = 35;
const GREEN_HUE_MAX: u8 = 85;

/// Bright greens: saturation and value at least this
const BRIGHT_GREEN_FLOOR: u8 = 40;

/// Dark greens: saturation and value at least this, value at most the ceiling
const DARK_GREEN_FLOOR: u8 = 25;
const DARK_GREEN_VALUE_CEILING: u8 = 200;

/// Both images below this greenness (%) count as barren
const BARREN_GREENNESS: f64 = 5.0;

/// Coarse description of the greenness change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressLevel {
    Exceptional,
    Significant,
    Good,
    Moderate,
    Stable,
    SlightDecline,
    ModerateDecline,
    SignificantDecline,
    NoVegetationProgress,
}

impl ProgressLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressLevel::Exceptional => "Exceptional",
            ProgressLevel::Significant => "Significant",
            ProgressLevel::Good => "Good",
            ProgressLevel::Moderate => "Moderate",
            ProgressLevel::Stable => "Stable",
            ProgressLevel::SlightDecline => "Slight Decline",
            ProgressLevel::ModerateDecline => "Moderate Decline",
            ProgressLevel::SignificantDecline => "Significant Decline",
            ProgressLevel::NoVegetationProgress => "No Vegetation Progress",
        }
    }
}

impl fmt::Display for ProgressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressConfidence {
    High,
    Medium,
}

/// Green-progress result for a before/after pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenProgress {
    /// 0.0 to 1.5
    pub multiplier: f64,
    pub progress_level: ProgressLevel,
    pub confidence_level: ProgressConfidence,
    pub before_green_percentage: f64,
    pub after_green_percentage: f64,
    /// Percentage points
    pub green_improvement: f64,
    pub justification: String,
}

impl GreenProgress {
    /// Grade the change between two greenness percentages
    pub fn from_percentages(before_green: f64, after_green: f64) -> Self {
        let improvement = after_green - before_green;

        let (multiplier, level, confidence) = if before_green < BARREN_GREENNESS
            && after_green < BARREN_GREENNESS
        {
            (0.0, ProgressLevel::NoVegetationProgress, ProgressConfidence::High)
        } else if improvement >= 40.0 {
            (1.5, ProgressLevel::Exceptional, ProgressConfidence::High)
        } else if improvement >= 25.0 {
            (1.3, ProgressLevel::Significant, ProgressConfidence::High)
        } else if improvement >= 15.0 {
            (1.2, ProgressLevel::Good, ProgressConfidence::High)
        } else if improvement >= 5.0 {
            (1.1, ProgressLevel::Moderate, ProgressConfidence::Medium)
        } else if improvement >= -5.0 {
            (1.0, ProgressLevel::Stable, ProgressConfidence::Medium)
        } else if improvement >= -15.0 {
            (0.8, ProgressLevel::SlightDecline, ProgressConfidence::Medium)
        } else if improvement >= -25.0 {
            (0.5, ProgressLevel::ModerateDecline, ProgressConfidence::Medium)
        } else {
            (0.2, ProgressLevel::SignificantDecline, ProgressConfidence::Medium)
        };

        Self {
            multiplier,
            progress_level: level,
            confidence_level: confidence,
            before_green_percentage: before_green,
            after_green_percentage: after_green,
            green_improvement: improvement,
            justification: justification(multiplier, improvement, level),
        }
    }
}

fn justification(multiplier: f64, improvement: f64, level: ProgressLevel) -> String {
    if multiplier >= 1.4 {
        format!("{} vegetation growth ({:+.1}%) - Maximum credit boost", level, improvement)
    } else if multiplier >= 1.2 {
        format!("{} vegetation growth ({:+.1}%) - High credit boost", level, improvement)
    } else if multiplier >= 1.05 {
        format!("{} vegetation growth ({:+.1}%) - Moderate credit boost", level, improvement)
    } else if multiplier >= 0.95 {
        format!("{} vegetation ({:+.1}%) - Standard calculation", level, improvement)
    } else if multiplier >= 0.5 {
        format!("{} in vegetation ({:+.1}%) - Reduced credits", level, improvement)
    } else if multiplier > 0.1 {
        format!("{} in vegetation ({:+.1}%) - Minimal credits", level, improvement)
    } else {
        format!("{} - No credits awarded", level)
    }
}

/// Green-pixel share analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct GreennessAnalyzer {
    converter: ColorConverter,
}

impl GreennessAnalyzer {
    pub fn new() -> Self {
        Self {
            converter: ColorConverter::new(),
        }
    }

    /// Percentage of green pixels (0-100)
    ///
    /// Images larger than 512 pixels on a side are downscaled first.
    pub fn measure(&self, image: &RgbImage) -> f64 {
        let total = (image.width() as usize) * (image.height() as usize);
        if total == 0 {
            return 0.0;
        }

        if image.width() > GREENNESS_MAX_DIMENSION || image.height() > GREENNESS_MAX_DIMENSION {
            let (small, _) = downscale_to(
                DynamicImage::ImageRgb8(image.clone()),
                GREENNESS_MAX_DIMENSION,
                GREENNESS_RESIZE_WIDTH,
                GREENNESS_RESIZE_HEIGHT,
            );
            return self.green_share(&small);
        }

        self.green_share(image)
    }

    /// Decode and measure an encoded image
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ImageLoadError` if the bytes cannot be decoded.
    pub fn measure_bytes(&self, bytes: &[u8]) -> Result<f64> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| AnalysisError::image_load("Failed to decode image for greenness", e))?;
        let (pixels, _) = downscale_to(
            decoded,
            GREENNESS_MAX_DIMENSION,
            GREENNESS_RESIZE_WIDTH,
            GREENNESS_RESIZE_HEIGHT,
        );
        Ok(self.measure(&pixels))
    }

    /// Compare greenness of two decoded images
    pub fn progress(&self, before: &RgbImage, after: &RgbImage) -> GreenProgress {
        let progress = GreenProgress::from_percentages(self.measure(before), self.measure(after));
        debug!(
            "Green progress: {:.1}% -> {:.1}%, multiplier {}",
            progress.before_green_percentage, progress.after_green_percentage, progress.multiplier
        );
        progress
    }

    /// Compare greenness of two encoded images
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ImageLoadError` if either image cannot be decoded.
    pub fn progress_from_bytes(&self, before: &[u8], after: &[u8]) -> Result<GreenProgress> {
        let before_green = self.measure_bytes(before)?;
        let after_green = self.measure_bytes(after)?;
        Ok(GreenProgress::from_percentages(before_green, after_green))
    }

    fn green_share(&self, image: &RgbImage) -> f64 {
        let total = (image.width() as usize) * (image.height() as usize);
        if total == 0 {
            return 0.0;
        }

        let green = image
            .pixels()
            .filter(|p| {
                let hsv = self.converter.rgb_to_hsv8(p[0], p[1], p[2]);
                let in_hue = hsv.hue >= GREEN_HUE_MIN && hsv.hue <= GREEN_HUE_MAX;
                let bright = hsv.saturation >= BRIGHT_GREEN_FLOOR && hsv.value >= BRIGHT_GREEN_FLOOR;
                let dark = hsv.saturation >= DARK_GREEN_FLOOR
                    && hsv.value >= DARK_GREEN_FLOOR
                    && hsv.value <= DARK_GREEN_VALUE_CEILING;
                in_hue && (bright || dark)
            })
            .count();

        green as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const FOREST: Rgb<u8> = Rgb([34, 139, 34]);
    const SOIL: Rgb<u8> = Rgb([150, 100, 50]);

    fn mixed(green_rows: u32) -> RgbImage {
        RgbImage::from_fn(10, 10, |_, y| if y < green_rows { FOREST } else { SOIL })
    }

    #[test]
    fn test_measure_green_share() {
        let analyzer = GreennessAnalyzer::new();
        assert_eq!(analyzer.measure(&mixed(0)), 0.0);
        assert!((analyzer.measure(&mixed(3)) - 30.0).abs() < 1e-9);
        assert_eq!(analyzer.measure(&mixed(10)), 100.0);
    }

    #[test]
    fn test_dark_green_counts() {
        // Saturation 255, value 30: only the dark-green window accepts it
        let image = RgbImage::from_pixel(4, 4, Rgb([0, 30, 0]));
        assert_eq!(GreennessAnalyzer::new().measure(&image), 100.0);
    }

    #[test]
    fn test_large_image_downscaled() {
        let image = RgbImage::from_fn(1024, 768, |x, _| if x < 512 { FOREST } else { SOIL });
        let share = GreennessAnalyzer::new().measure(&image);
        assert!((share - 50.0).abs() < 2.0);
    }

    #[test]
    fn test_progress_ladder() {
        let cases = [
            (10.0, 70.0, 1.5, ProgressLevel::Exceptional),
            (10.0, 40.0, 1.3, ProgressLevel::Significant),
            (10.0, 25.0, 1.2, ProgressLevel::Good),
            (10.0, 15.0, 1.1, ProgressLevel::Moderate),
            (50.0, 50.0, 1.0, ProgressLevel::Stable),
            (50.0, 40.0, 0.8, ProgressLevel::SlightDecline),
            (50.0, 30.0, 0.5, ProgressLevel::ModerateDecline),
            (50.0, 10.0, 0.2, ProgressLevel::SignificantDecline),
        ];
        for (before, after, multiplier, level) in cases {
            let progress = GreenProgress::from_percentages(before, after);
            assert_eq!(progress.multiplier, multiplier, "{} -> {}", before, after);
            assert_eq!(progress.progress_level, level);
        }
    }

    #[test]
    fn test_barren_pair_gets_nothing() {
        let progress = GreenProgress::from_percentages(1.0, 4.0);
        assert_eq!(progress.multiplier, 0.0);
        assert_eq!(progress.progress_level, ProgressLevel::NoVegetationProgress);
        assert_eq!(progress.confidence_level, ProgressConfidence::High);
        assert_eq!(progress.justification, "No Vegetation Progress - No credits awarded");
    }

    #[test]
    fn test_justification_text() {
        let progress = GreenProgress::from_percentages(10.0, 70.0);
        assert_eq!(
            progress.justification,
            "Exceptional vegetation growth (+60.0%) - Maximum credit boost"
        );
    }

    #[test]
    fn test_progress_from_bytes_rejects_garbage() {
        let analyzer = GreennessAnalyzer::new();
        assert!(analyzer.progress_from_bytes(b"nope", b"nope").is_err());
    }
}
