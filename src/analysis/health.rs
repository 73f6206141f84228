//! NDVI health scoring and single-image analysis results
//!
//! Turns the per-pixel NDVI field and the detector outputs into an
//! [`ImageAnalysisResult`]:
//! - Every pixel lands in exactly one health band (healthy, moderate, sparse, bare)
//! - A weighted health index over the bands
//! - A mangrove-likelihood indicator from high-NDVI canopy
//! - A confidence score that is always reported within `[60, 95]`

use crate::analysis::Degradation;
use crate::constants::{confidence, ndvi::HEALTH_WEIGHTS};
use crate::config::VegetationConfig;
use crate::detection::vegetation::NdviField;
use crate::detection::CompositionResult;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Allowed slack when checking that band percentages sum to 100
const BAND_SUM_TOLERANCE: f64 = 1e-6;

/// Analysed image size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// NDVI summary statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NdviStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

/// Vegetation coverage and NDVI health bands (percentages)
///
/// `healthy + moderate + sparse + bare == 100`. `total_coverage` comes from
/// the color-space masks and is independent of the bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegetationBreakdown {
    pub total_coverage: f64,
    pub healthy: f64,
    pub moderate: f64,
    pub sparse: f64,
    pub bare: f64,
}

/// Soil, water and texture measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionBreakdown {
    pub soil_percentage: f64,
    pub water_percentage: f64,
    pub texture_complexity: f64,
    pub color_variance: f64,
}

/// Ecosystem indicators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionFlags {
    pub mangrove_detected: bool,
    /// Share of pixels (%) with mangrove-like NDVI
    pub mangrove_likelihood: f64,
    pub health_index: f64,
}

/// Coarse label for the per-image confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisQuality {
    High,
    Medium,
    Basic,
}

impl AnalysisQuality {
    pub fn from_confidence(score: f64) -> Self {
        if score > 85.0 {
            AnalysisQuality::High
        } else if score > 70.0 {
            AnalysisQuality::Medium
        } else {
            AnalysisQuality::Basic
        }
    }
}

/// Confidence and area estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerificationMetrics {
    /// Always within `[60, 95]`
    pub confidence_score: f64,
    /// Vegetation coverage not explained by water
    pub planted_area_estimate: f64,
    /// Soil plus half of the bare band
    pub empty_land_estimate: f64,
    pub analysis_quality: AnalysisQuality,
}

/// Complete analysis of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysisResult {
    /// Caller-supplied name, e.g. "before_image"
    pub label: String,
    pub dimensions: ImageDimensions,
    pub ndvi: NdviStats,
    pub vegetation: VegetationBreakdown,
    pub composition: CompositionBreakdown,
    pub detection: DetectionFlags,
    pub verification: VerificationMetrics,
    pub summary: String,
    /// Sub-stages that failed and were replaced by neutral values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl ImageAnalysisResult {
    /// Neutral stand-in used when an image could not be analysed at all
    ///
    /// No vegetation, fully bare, confidence 70.
    pub fn neutral(label: impl Into<String>, dimensions: ImageDimensions) -> Self {
        let confidence_score = confidence::NEUTRAL_SCORE;
        Self {
            label: label.into(),
            dimensions,
            ndvi: NdviStats {
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                std: 0.0,
            },
            vegetation: VegetationBreakdown {
                total_coverage: 0.0,
                healthy: 0.0,
                moderate: 0.0,
                sparse: 0.0,
                bare: 100.0,
            },
            composition: CompositionBreakdown {
                soil_percentage: 0.0,
                water_percentage: 0.0,
                texture_complexity: 0.0,
                color_variance: 0.0,
            },
            detection: DetectionFlags {
                mangrove_detected: false,
                mangrove_likelihood: 0.0,
                health_index: 0.0,
            },
            verification: VerificationMetrics {
                confidence_score,
                planted_area_estimate: 0.0,
                empty_land_estimate: 50.0,
                analysis_quality: AnalysisQuality::from_confidence(confidence_score),
            },
            summary: "Image analysis unavailable; neutral values substituted.".to_string(),
            degradations: Vec::new(),
        }
    }

    /// Check the invariants every analysis result must satisfy
    pub fn validate(&self) -> Result<()> {
        let percentages = [
            ("total_coverage", self.vegetation.total_coverage),
            ("healthy", self.vegetation.healthy),
            ("moderate", self.vegetation.moderate),
            ("sparse", self.vegetation.sparse),
            ("bare", self.vegetation.bare),
            ("soil_percentage", self.composition.soil_percentage),
            ("water_percentage", self.composition.water_percentage),
            ("mangrove_likelihood", self.detection.mangrove_likelihood),
        ];
        for (name, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(AnalysisError::computation(
                    "health_scoring",
                    format!("{} out of range: {}", name, value),
                ));
            }
        }

        let band_sum = self.vegetation.healthy
            + self.vegetation.moderate
            + self.vegetation.sparse
            + self.vegetation.bare;
        if (band_sum - 100.0).abs() > BAND_SUM_TOLERANCE {
            return Err(AnalysisError::computation(
                "health_scoring",
                format!("health bands sum to {}", band_sum),
            ));
        }

        let score = self.verification.confidence_score;
        if !(confidence::MIN_SCORE..=confidence::MAX_SCORE).contains(&score) {
            return Err(AnalysisError::computation(
                "health_scoring",
                format!("confidence out of range: {}", score),
            ));
        }

        let stats = [self.ndvi.mean, self.ndvi.min, self.ndvi.max, self.ndvi.std];
        if stats.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::computation("health_scoring", "non-finite NDVI statistics"));
        }

        Ok(())
    }
}

/// Health band percentages and derived indicators for one NDVI field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthMetrics {
    pub stats: NdviStats,
    pub healthy: f64,
    pub moderate: f64,
    pub sparse: f64,
    pub bare: f64,
    pub health_index: f64,
    pub mangrove_likelihood: f64,
    pub mangrove_detected: bool,
}

/// Health scorer turning NDVI and detector output into analysis results
pub struct HealthScorer {
    config: VegetationConfig,
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthScorer {
    pub fn new() -> Self {
        Self::with_config(VegetationConfig::default())
    }

    pub fn with_config(config: VegetationConfig) -> Self {
        Self { config }
    }

    /// Classify NDVI pixels into health bands
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::EmptyImage` for an empty field.
    pub fn health_metrics(&self, ndvi: &NdviField) -> Result<HealthMetrics> {
        if ndvi.is_empty() {
            return Err(AnalysisError::EmptyImage {
                width: ndvi.width(),
                height: ndvi.height(),
            });
        }

        let healthy_threshold = self.config.healthy_threshold;
        let moderate_threshold = self.config.moderate_threshold;

        let mut counts = [0usize; 4];
        let mut mangrove_pixels = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for &value in ndvi.values() {
            let band = if value > healthy_threshold {
                0
            } else if value > moderate_threshold {
                1
            } else if value > 0.0 {
                2
            } else {
                3
            };
            counts[band] += 1;

            if value > self.config.mangrove_pixel_threshold {
                mangrove_pixels += 1;
            }
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        let total = ndvi.len() as f64;
        let mean = sum / total;
        let std = (ndvi.values().iter().map(|v| (v - mean).powi(2)).sum::<f64>() / total).sqrt();

        let [healthy, moderate, sparse, bare] = counts.map(|c| c as f64 / total * 100.0);
        let health_index = healthy * HEALTH_WEIGHTS[0]
            + moderate * HEALTH_WEIGHTS[1]
            + sparse * HEALTH_WEIGHTS[2]
            + bare * HEALTH_WEIGHTS[3];
        let mangrove_likelihood = mangrove_pixels as f64 / total * 100.0;

        Ok(HealthMetrics {
            stats: NdviStats { mean, min, max, std },
            healthy,
            moderate,
            sparse,
            bare,
            health_index,
            mangrove_likelihood,
            mangrove_detected: mangrove_likelihood > self.config.mangrove_likelihood_threshold,
        })
    }

    /// Assemble the full analysis result for one image
    ///
    /// # Arguments
    ///
    /// * `label` - Name carried into the result
    /// * `dimensions` - Size of the analysed image
    /// * `vegetation_coverage` - Combined-mask coverage from the detector
    /// * `ndvi` - Per-pixel NDVI field
    /// * `composition` - Soil/water/texture measurements
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError` if the NDVI field is empty or the assembled
    /// result violates its invariants.
    pub fn score(
        &self,
        label: &str,
        dimensions: ImageDimensions,
        vegetation_coverage: f64,
        ndvi: &NdviField,
        composition: &CompositionResult,
    ) -> Result<ImageAnalysisResult> {
        let health = self.health_metrics(ndvi)?;

        let confidence_score =
            confidence_score(vegetation_coverage, health.health_index, composition);

        let summary = analysis_summary(
            vegetation_coverage,
            &health,
            composition,
            confidence_score,
        );

        let result = ImageAnalysisResult {
            label: label.to_string(),
            dimensions,
            ndvi: health.stats,
            vegetation: VegetationBreakdown {
                total_coverage: vegetation_coverage,
                healthy: health.healthy,
                moderate: health.moderate,
                sparse: health.sparse,
                bare: health.bare,
            },
            composition: CompositionBreakdown {
                soil_percentage: composition.soil_percentage,
                water_percentage: composition.water_percentage,
                texture_complexity: composition.texture_complexity,
                color_variance: composition.color_variance,
            },
            detection: DetectionFlags {
                mangrove_detected: health.mangrove_detected,
                mangrove_likelihood: health.mangrove_likelihood,
                health_index: health.health_index,
            },
            verification: VerificationMetrics {
                confidence_score,
                planted_area_estimate: (vegetation_coverage - composition.water_percentage).max(0.0),
                empty_land_estimate: composition.soil_percentage + health.bare / 2.0,
                analysis_quality: AnalysisQuality::from_confidence(confidence_score),
            },
            summary,
            degradations: Vec::new(),
        };

        result.validate()?;
        Ok(result)
    }
}

/// Blend four clamped factors into a confidence within `[60, 95]`
pub fn confidence_score(
    vegetation_coverage: f64,
    health_index: f64,
    composition: &CompositionResult,
) -> f64 {
    let factors = [
        vegetation_coverage / confidence::COVERAGE_SCALE,
        health_index / confidence::HEALTH_SCALE,
        composition.texture_complexity / confidence::TEXTURE_SCALE,
        1.0 - (composition.water_percentage / 100.0).min(confidence::MAX_WATER_PENALTY),
    ];

    let blended = factors
        .iter()
        .map(|f| if f.is_finite() { f.clamp(0.0, 1.0) } else { 0.0 })
        .sum::<f64>()
        / factors.len() as f64
        * 100.0;

    blended.clamp(confidence::MIN_SCORE, confidence::MAX_SCORE)
}

fn analysis_summary(
    vegetation_coverage: f64,
    health: &HealthMetrics,
    composition: &CompositionResult,
    confidence_score: f64,
) -> String {
    let mut parts: Vec<&str> = Vec::new();

    parts.push(if vegetation_coverage > 60.0 {
        "High vegetation coverage detected"
    } else if vegetation_coverage > 30.0 {
        "Moderate vegetation coverage observed"
    } else if vegetation_coverage > 10.0 {
        "Limited vegetation coverage identified"
    } else {
        "Minimal vegetation detected"
    });

    if health.mangrove_detected {
        parts.push("mangrove-like vegetation patterns identified");
    }

    parts.push(if health.health_index > 70.0 {
        "vegetation appears healthy"
    } else if health.health_index > 40.0 {
        "vegetation shows moderate health"
    } else {
        "vegetation health needs attention"
    });

    if composition.soil_percentage > 30.0 {
        parts.push("significant exposed soil areas present");
    }
    if composition.water_percentage > 20.0 {
        parts.push("water bodies identified in analysis area");
    }

    let qualifier = if confidence_score > 85.0 {
        "High confidence in analysis results."
    } else if confidence_score > 70.0 {
        "Good confidence in analysis results."
    } else {
        "Basic analysis - consider additional verification."
    };

    format!("{}. {}", parts.join(". "), qualifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> ImageDimensions {
        ImageDimensions { width: 4, height: 1, channels: 3 }
    }

    #[test]
    fn test_bands_partition_pixels() {
        let field = NdviField::from_values(4, 1, vec![0.6, 0.3, 0.1, -0.2]).unwrap();
        let metrics = HealthScorer::new().health_metrics(&field).unwrap();

        assert_eq!(metrics.healthy, 25.0);
        assert_eq!(metrics.moderate, 25.0);
        assert_eq!(metrics.sparse, 25.0);
        assert_eq!(metrics.bare, 25.0);
        assert!((metrics.health_index - (25.0 + 17.5 + 7.5)).abs() < 1e-9);
        assert_eq!(metrics.mangrove_likelihood, 25.0);
        assert!(metrics.mangrove_detected);
    }

    #[test]
    fn test_band_boundaries() {
        // 0.4 is moderate, 0.2 is sparse, 0.0 is bare
        let field = NdviField::from_values(3, 1, vec![0.4, 0.2, 0.0]).unwrap();
        let metrics = HealthScorer::new().health_metrics(&field).unwrap();

        assert_eq!(metrics.healthy, 0.0);
        assert!((metrics.moderate - 100.0 / 3.0).abs() < 1e-9);
        assert!((metrics.sparse - 100.0 / 3.0).abs() < 1e-9);
        assert!((metrics.bare - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ndvi_stats() {
        let field = NdviField::from_values(2, 1, vec![0.5, -0.5]).unwrap();
        let metrics = HealthScorer::new().health_metrics(&field).unwrap();

        assert_eq!(metrics.stats.mean, 0.0);
        assert_eq!(metrics.stats.min, -0.5);
        assert_eq!(metrics.stats.max, 0.5);
        assert_eq!(metrics.stats.std, 0.5);
    }

    #[test]
    fn test_confidence_clamped_low() {
        let score = confidence_score(0.0, 0.0, &CompositionResult {
            water_percentage: 100.0,
            ..CompositionResult::empty()
        });
        assert_eq!(score, 60.0);
    }

    #[test]
    fn test_confidence_clamped_high() {
        let composition = CompositionResult {
            texture_complexity: 500.0,
            ..CompositionResult::empty()
        };
        assert_eq!(confidence_score(100.0, 100.0, &composition), 95.0);
    }

    #[test]
    fn test_confidence_blend() {
        // (0.5 + 0.5 + 0.5 + 0.9) / 4 = 0.6 -> 60; nudge coverage up for 65
        let composition = CompositionResult {
            texture_complexity: 50.0,
            water_percentage: 10.0,
            ..CompositionResult::empty()
        };
        let score = confidence_score(45.0, 40.0, &composition);
        assert!((score - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_photo_saturates_texture_term() {
        use crate::detection::composition::CompositionAnalyzer;
        use image::{Rgb, RgbImage};

        // Soil with a deterministic ±12 brightness jitter
        let image = RgbImage::from_fn(120, 90, |x, y| {
            let hash = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503))
                .wrapping_mul(2_246_822_519)
                >> 16;
            let jitter = (hash % 25) as i32 - 12;
            let shift = |c: u8| (c as i32 + jitter).clamp(0, 255) as u8;
            Rgb([shift(150), shift(100), shift(50)])
        });
        let composition = CompositionAnalyzer::new().analyze(&image).unwrap();
        assert_eq!(composition.water_percentage, 0.0);

        // Coverage and health contribute 0.5 each, water 1.0, texture 1.0
        let score = confidence_score(25.0, 40.0, &composition);
        assert!((score - 75.0).abs() < 1e-9, "confidence {}", score);
    }

    #[test]
    fn test_score_builds_valid_result() {
        let field = NdviField::from_values(4, 1, vec![0.6, 0.6, 0.6, -0.1]).unwrap();
        let result = HealthScorer::new()
            .score("after_image", dims(), 75.0, &field, &CompositionResult::empty())
            .unwrap();

        assert_eq!(result.label, "after_image");
        assert_eq!(result.vegetation.total_coverage, 75.0);
        assert_eq!(result.vegetation.healthy, 75.0);
        assert!(result.detection.mangrove_detected);
        assert!(result.summary.starts_with("High vegetation coverage detected"));
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_neutral_result_is_valid() {
        let neutral = ImageAnalysisResult::neutral("before_image", dims());
        assert!(neutral.validate().is_ok());
        assert_eq!(neutral.verification.confidence_score, 70.0);
        assert_eq!(neutral.vegetation.bare, 100.0);
    }

    #[test]
    fn test_validate_rejects_bad_bands() {
        let mut result = ImageAnalysisResult::neutral("x", dims());
        result.vegetation.bare = 90.0;
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_analysis_quality_labels() {
        assert_eq!(AnalysisQuality::from_confidence(90.0), AnalysisQuality::High);
        assert_eq!(AnalysisQuality::from_confidence(75.0), AnalysisQuality::Medium);
        assert_eq!(AnalysisQuality::from_confidence(70.0), AnalysisQuality::Basic);
    }
}
