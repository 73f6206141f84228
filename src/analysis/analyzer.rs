//! Single-image analysis pipeline
//!
//! Runs vegetation detection, composition analysis and health scoring over one
//! image. Decoding failures are input errors and propagate to the caller; a
//! failure in any later stage is recorded as a [`Degradation`] and replaced by
//! neutral values so a result is always produced.

use crate::analysis::health::{HealthScorer, ImageAnalysisResult, ImageDimensions};
use crate::analysis::Degradation;
use crate::config::PipelineConfig;
use crate::detection::vegetation::NdviField;
use crate::detection::{CompositionAnalyzer, CompositionResult, VegetationDetector};
use crate::error::Result;
use crate::image_loader::load_image_bytes;
use image::RgbImage;
use log::debug;

/// Analyzer for a single site photograph
pub struct ImageAnalyzer {
    config: PipelineConfig,
    detector: VegetationDetector,
    composition: CompositionAnalyzer,
    scorer: HealthScorer,
}

impl Default for ImageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAnalyzer {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            detector: VegetationDetector::with_config(config.vegetation.clone()),
            composition: CompositionAnalyzer::new(),
            scorer: HealthScorer::with_config(config.vegetation.clone()),
            config,
        }
    }

    /// Decode and analyse an encoded image
    ///
    /// # Arguments
    ///
    /// * `bytes` - Encoded image as read by the caller
    /// * `label` - Name carried into the result (e.g. "before_image")
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ImageLoadError` or `AnalysisError::EmptyImage`
    /// when the bytes cannot be decoded into a non-empty image.
    pub fn analyze_bytes(&self, bytes: &[u8], label: &str) -> Result<ImageAnalysisResult> {
        let loaded = load_image_bytes(bytes, &self.config.image)?;
        Ok(self.analyze(&loaded.pixels, label))
    }

    /// Analyse decoded pixels at analysis resolution
    ///
    /// Never fails: stages that error are listed in `degradations`.
    pub fn analyze(&self, image: &RgbImage, label: &str) -> ImageAnalysisResult {
        let dimensions = ImageDimensions {
            width: image.width(),
            height: image.height(),
            channels: 3,
        };
        let context = format!("{} {}x{}", label, image.width(), image.height());
        let mut degradations = Vec::new();

        let (coverage, ndvi) = match self.detector.detect(image) {
            Ok(detection) => (detection.vegetation_percentage, detection.ndvi),
            Err(e) => {
                degradations.push(Degradation::record("vegetation_detection", &e, &context));
                (0.0, neutral_ndvi(image))
            }
        };

        let composition = match self.composition.analyze(image) {
            Ok(result) => result,
            Err(e) => {
                degradations.push(Degradation::record("composition_analysis", &e, &context));
                CompositionResult::empty()
            }
        };

        let mut result = match self.scorer.score(label, dimensions, coverage, &ndvi, &composition) {
            Ok(result) => result,
            Err(e) => {
                degradations.push(Degradation::record("health_scoring", &e, &context));
                ImageAnalysisResult::neutral(label, dimensions)
            }
        };

        debug!(
            "{}: coverage {:.2}%, NDVI mean {:.3}, confidence {:.1}",
            label,
            result.vegetation.total_coverage,
            result.ndvi.mean,
            result.verification.confidence_score
        );

        result.degradations = degradations;
        result
    }
}

/// All-zero NDVI field matching the image size
fn neutral_ndvi(image: &RgbImage) -> NdviField {
    NdviField::from_image(&RgbImage::new(image.width(), image.height()), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    const FOREST: Rgb<u8> = Rgb([34, 139, 34]);
    const SOIL: Rgb<u8> = Rgb([150, 100, 50]);

    fn encode_png(image: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_forest_image() {
        let image = RgbImage::from_pixel(40, 30, FOREST);
        let result = ImageAnalyzer::new().analyze(&image, "after_image");

        assert_eq!(result.vegetation.total_coverage, 100.0);
        assert_eq!(result.vegetation.healthy, 100.0);
        assert!(result.detection.mangrove_detected);
        assert!(result.degradations.is_empty());
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_soil_image() {
        let image = RgbImage::from_pixel(40, 30, SOIL);
        let result = ImageAnalyzer::new().analyze(&image, "before_image");

        assert_eq!(result.vegetation.total_coverage, 0.0);
        assert_eq!(result.vegetation.bare, 100.0);
        assert_eq!(result.composition.soil_percentage, 100.0);
        assert_eq!(result.verification.confidence_score, 60.0);
        assert!(result.summary.contains("significant exposed soil areas present"));
    }

    #[test]
    fn test_analyze_bytes() {
        let bytes = encode_png(RgbImage::from_fn(20, 20, |x, _| if x < 10 { FOREST } else { SOIL }));
        let result = ImageAnalyzer::new().analyze_bytes(&bytes, "before_image").unwrap();

        assert_eq!(result.label, "before_image");
        assert_eq!(result.dimensions.width, 20);
        assert!((result.vegetation.total_coverage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_undecodable_bytes_propagate() {
        assert!(ImageAnalyzer::new().analyze_bytes(b"not an image", "before_image").is_err());
    }

    #[test]
    fn test_empty_pixels_degrade() {
        let result = ImageAnalyzer::new().analyze(&RgbImage::new(0, 0), "before_image");

        assert_eq!(result.verification.confidence_score, 70.0);
        let stages: Vec<&str> = result.degradations.iter().map(|d| d.stage.as_str()).collect();
        assert_eq!(stages, vec!["vegetation_detection", "composition_analysis", "health_scoring"]);
    }
}
