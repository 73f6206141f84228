//! Before/after transformation analysis
//!
//! Compares two [`ImageAnalysisResult`]s and produces:
//! - Absolute and relative vegetation change, NDVI improvement and bare-land reduction
//! - A transformation type from a fixed, priority-ordered taxonomy
//! - A 0-100 transformation score built from three independently capped parts
//! - A quality label, per-band deltas and a land-use change classification
//! - The verification score combining image, transformation and CO2 confidence

use crate::analysis::health::ImageAnalysisResult;
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transformation score caps for the vegetation, NDVI and bare-land parts
const VEGETATION_SCORE_CAP: f64 = 60.0;
const NDVI_SCORE_CAP: f64 = 25.0;
const BARE_LAND_SCORE_CAP: f64 = 15.0;

/// Verification score weights for image, transformation and CO2 confidence
const VERIFICATION_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];

/// Land-cover change classification, first match wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    BarrenToDenseVegetation,
    BarrenToModerateVegetation,
    SparseToDenseVegetation,
    ModerateToDenseVegetation,
    MaintainedVegetation,
    VegetationDegradation,
    NoSignificantChange,
}

impl TransformationType {
    /// Classify a coverage change (percentage points)
    pub fn classify(before_coverage: f64, after_coverage: f64) -> Self {
        let change = after_coverage - before_coverage;

        if change > 30.0 && before_coverage < 20.0 {
            TransformationType::BarrenToDenseVegetation
        } else if change > 20.0 && before_coverage < 30.0 {
            TransformationType::BarrenToModerateVegetation
        } else if change > 15.0 && before_coverage < 50.0 {
            TransformationType::SparseToDenseVegetation
        } else if change > 10.0 && before_coverage >= 30.0 {
            TransformationType::ModerateToDenseVegetation
        } else if change.abs() <= 5.0 && after_coverage > 40.0 {
            TransformationType::MaintainedVegetation
        } else if change < -10.0 {
            TransformationType::VegetationDegradation
        } else {
            TransformationType::NoSignificantChange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationType::BarrenToDenseVegetation => "barren_to_dense_vegetation",
            TransformationType::BarrenToModerateVegetation => "barren_to_moderate_vegetation",
            TransformationType::SparseToDenseVegetation => "sparse_to_dense_vegetation",
            TransformationType::ModerateToDenseVegetation => "moderate_to_dense_vegetation",
            TransformationType::MaintainedVegetation => "maintained_vegetation",
            TransformationType::VegetationDegradation => "vegetation_degradation",
            TransformationType::NoSignificantChange => "no_significant_change",
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical judgement of the observed change
///
/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationQuality {
    Excellent,
    VeryGood,
    Good,
    Moderate,
    Minimal,
    Poor,
}

impl TransformationQuality {
    /// Grade a transformation; every threshold of a label must be cleared
    ///
    /// # Arguments
    ///
    /// * `score` - Transformation score (0-100)
    /// * `vegetation_change_percentage` - Coverage change relative to before
    /// * `ndvi_improvement` - Mean NDVI delta
    pub fn assess(score: f64, vegetation_change_percentage: f64, ndvi_improvement: f64) -> Self {
        let change = vegetation_change_percentage;

        if score > 80.0 && change > 25.0 && ndvi_improvement > 0.3 {
            TransformationQuality::Excellent
        } else if score > 60.0 && change > 15.0 && ndvi_improvement > 0.2 {
            TransformationQuality::VeryGood
        } else if score > 40.0 && change > 10.0 && ndvi_improvement > 0.1 {
            TransformationQuality::Good
        } else if score > 20.0 && change > 5.0 {
            TransformationQuality::Moderate
        } else if change > 0.0 {
            TransformationQuality::Minimal
        } else {
            TransformationQuality::Poor
        }
    }

    /// Weight of the transformation score in the verification score
    pub fn verification_multiplier(&self) -> f64 {
        match self {
            TransformationQuality::Excellent => 1.0,
            TransformationQuality::VeryGood => 0.9,
            TransformationQuality::Good => 0.8,
            TransformationQuality::Moderate => 0.7,
            TransformationQuality::Minimal => 0.6,
            TransformationQuality::Poor => 0.4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationQuality::Excellent => "excellent",
            TransformationQuality::VeryGood => "very_good",
            TransformationQuality::Good => "good",
            TransformationQuality::Moderate => "moderate",
            TransformationQuality::Minimal => "minimal",
            TransformationQuality::Poor => "poor",
        }
    }
}

impl fmt::Display for TransformationQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-band vegetation deltas (after minus before, percentage points)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandChanges {
    pub healthy: f64,
    pub moderate: f64,
    pub sparse: f64,
    pub bare_land: f64,
}

/// NDVI statistic deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NdviChanges {
    pub mean: f64,
    pub max: f64,
    pub std: f64,
}

/// Composition deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionChanges {
    pub soil: f64,
    pub water: f64,
    pub texture: f64,
}

/// Dominant land cover of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandCover {
    WaterDominated,
    DenseVegetation,
    ModerateVegetation,
    SparseVegetation,
    BareLand,
    Degraded,
}

impl LandCover {
    pub fn dominant(analysis: &ImageAnalysisResult) -> Self {
        let coverage = analysis.vegetation.total_coverage;

        if analysis.composition.water_percentage > 40.0 {
            LandCover::WaterDominated
        } else if coverage > 60.0 {
            LandCover::DenseVegetation
        } else if coverage > 30.0 {
            LandCover::ModerateVegetation
        } else if coverage > 10.0 {
            LandCover::SparseVegetation
        } else if analysis.composition.soil_percentage > 40.0 || analysis.vegetation.bare > 50.0 {
            LandCover::BareLand
        } else {
            LandCover::Degraded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LandCover::WaterDominated => "water_dominated",
            LandCover::DenseVegetation => "dense_vegetation",
            LandCover::ModerateVegetation => "moderate_vegetation",
            LandCover::SparseVegetation => "sparse_vegetation",
            LandCover::BareLand => "bare_land",
            LandCover::Degraded => "degraded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeIntensity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Improvement,
    Degradation,
    Stable,
}

/// Land-use change between the two images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUseChange {
    pub before_dominant_cover: LandCover,
    pub after_dominant_cover: LandCover,
    /// `<before>_to_<after>`
    pub change_type: String,
    pub change_direction: ChangeDirection,
    pub change_intensity: ChangeIntensity,
    pub vegetation_change_magnitude: f64,
    /// Bare or degraded land that became dense or moderate vegetation
    pub is_restoration_project: bool,
}

impl LandUseChange {
    pub fn classify(before: &ImageAnalysisResult, after: &ImageAnalysisResult) -> Self {
        let before_cover = LandCover::dominant(before);
        let after_cover = LandCover::dominant(after);
        let change = after.vegetation.total_coverage - before.vegetation.total_coverage;

        let change_intensity = if change.abs() > 30.0 {
            ChangeIntensity::High
        } else if change.abs() > 15.0 {
            ChangeIntensity::Medium
        } else {
            ChangeIntensity::Low
        };

        let change_direction = if change > 5.0 {
            ChangeDirection::Improvement
        } else if change < -5.0 {
            ChangeDirection::Degradation
        } else {
            ChangeDirection::Stable
        };

        let is_restoration_project = matches!(before_cover, LandCover::BareLand | LandCover::Degraded)
            && matches!(after_cover, LandCover::DenseVegetation | LandCover::ModerateVegetation);

        Self {
            before_dominant_cover: before_cover,
            after_dominant_cover: after_cover,
            change_type: format!("{}_to_{}", before_cover.as_str(), after_cover.as_str()),
            change_direction,
            change_intensity,
            vegetation_change_magnitude: change.abs(),
            is_restoration_project,
        }
    }
}

/// Everything derived from a before/after pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationMetrics {
    pub before_vegetation_coverage: f64,
    pub after_vegetation_coverage: f64,
    /// Percentage points
    pub vegetation_change_absolute: f64,
    /// Relative to the before coverage (floored at 1)
    pub vegetation_change_percentage: f64,
    pub ndvi_improvement: f64,
    pub bare_land_reduction: f64,
    pub transformation_type: TransformationType,
    /// 0-100
    pub transformation_score: f64,
    pub transformation_quality: TransformationQuality,
    pub vegetation_details: BandChanges,
    pub ndvi_details: NdviChanges,
    pub composition_details: CompositionChanges,
    pub land_use_change: LandUseChange,
    /// 0-100
    pub ecosystem_improvement_score: f64,
}

impl TransformationMetrics {
    /// Neutral stand-in for a failed comparison: no change, poor quality
    pub fn neutral() -> Self {
        Self {
            before_vegetation_coverage: 0.0,
            after_vegetation_coverage: 0.0,
            vegetation_change_absolute: 0.0,
            vegetation_change_percentage: 0.0,
            ndvi_improvement: 0.0,
            bare_land_reduction: 0.0,
            transformation_type: TransformationType::NoSignificantChange,
            transformation_score: 0.0,
            transformation_quality: TransformationQuality::Poor,
            vegetation_details: BandChanges {
                healthy: 0.0,
                moderate: 0.0,
                sparse: 0.0,
                bare_land: 0.0,
            },
            ndvi_details: NdviChanges {
                mean: 0.0,
                max: 0.0,
                std: 0.0,
            },
            composition_details: CompositionChanges {
                soil: 0.0,
                water: 0.0,
                texture: 0.0,
            },
            land_use_change: LandUseChange {
                before_dominant_cover: LandCover::Degraded,
                after_dominant_cover: LandCover::Degraded,
                change_type: "degraded_to_degraded".to_string(),
                change_direction: ChangeDirection::Stable,
                change_intensity: ChangeIntensity::Low,
                vegetation_change_magnitude: 0.0,
                is_restoration_project: false,
            },
            ecosystem_improvement_score: 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        let values = [
            ("vegetation_change_absolute", self.vegetation_change_absolute),
            ("vegetation_change_percentage", self.vegetation_change_percentage),
            ("ndvi_improvement", self.ndvi_improvement),
            ("bare_land_reduction", self.bare_land_reduction),
            ("transformation_score", self.transformation_score),
            ("ecosystem_improvement_score", self.ecosystem_improvement_score),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AnalysisError::computation(
                "transformation_scoring",
                format!("{} is not finite: {}", name, value),
            ));
        }
        Ok(())
    }
}

/// Verification confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    HighConfidence,
    GoodConfidence,
    ModerateConfidence,
    LowConfidence,
    Insufficient,
}

impl VerificationLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            VerificationLevel::HighConfidence
        } else if score >= 70.0 {
            VerificationLevel::GoodConfidence
        } else if score >= 55.0 {
            VerificationLevel::ModerateConfidence
        } else if score >= 40.0 {
            VerificationLevel::LowConfidence
        } else {
            VerificationLevel::Insufficient
        }
    }

    /// Whether this is the top tier, required for the full provisional share
    pub fn is_high(&self) -> bool {
        matches!(self, VerificationLevel::HighConfidence)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationLevel::HighConfidence => "high_confidence",
            VerificationLevel::GoodConfidence => "good_confidence",
            VerificationLevel::ModerateConfidence => "moderate_confidence",
            VerificationLevel::LowConfidence => "low_confidence",
            VerificationLevel::Insufficient => "insufficient",
        }
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action suggested to the project reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ApproveFullCredits,
    ApproveWithMonitoring,
    ApprovePartialCredits,
    RequireAdditionalEvidence,
    RequireManualReview,
}

impl RecommendedAction {
    pub fn decide(score: f64, quality: TransformationQuality) -> Self {
        use TransformationQuality::*;

        if score >= 80.0 && matches!(quality, Excellent | VeryGood) {
            RecommendedAction::ApproveFullCredits
        } else if score >= 65.0 && matches!(quality, Good | VeryGood) {
            RecommendedAction::ApproveWithMonitoring
        } else if score >= 50.0 {
            RecommendedAction::ApprovePartialCredits
        } else if score >= 35.0 {
            RecommendedAction::RequireAdditionalEvidence
        } else {
            RecommendedAction::RequireManualReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::ApproveFullCredits => "approve_full_credits",
            RecommendedAction::ApproveWithMonitoring => "approve_with_monitoring",
            RecommendedAction::ApprovePartialCredits => "approve_partial_credits",
            RecommendedAction::RequireAdditionalEvidence => "require_additional_evidence",
            RecommendedAction::RequireManualReview => "require_manual_review",
        }
    }
}

/// Overall verification confidence and its components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationScore {
    pub overall_score: f64,
    /// Mean per-image confidence
    pub image_analysis_confidence: f64,
    /// Transformation score weighted by quality
    pub transformation_confidence: f64,
    /// CO2 confidence factor as a percentage
    pub co2_calculation_confidence: f64,
    pub transformation_quality: TransformationQuality,
    pub verification_level: VerificationLevel,
    pub recommended_action: RecommendedAction,
}

impl VerificationScore {
    /// Stand-in for a failed verification: zero score, manual review
    pub fn insufficient(transformation_quality: TransformationQuality) -> Self {
        Self {
            overall_score: 0.0,
            image_analysis_confidence: 0.0,
            transformation_confidence: 0.0,
            co2_calculation_confidence: 0.0,
            transformation_quality,
            verification_level: VerificationLevel::Insufficient,
            recommended_action: RecommendedAction::RequireManualReview,
        }
    }
}

/// Transformation score from its three capped parts
pub fn transformation_score(vegetation_change: f64, ndvi_improvement: f64, bare_reduction: f64) -> f64 {
    let vegetation = (vegetation_change * 2.0).clamp(0.0, VEGETATION_SCORE_CAP);
    let ndvi = (ndvi_improvement * 100.0).clamp(0.0, NDVI_SCORE_CAP);
    let bare = (bare_reduction * 0.5).clamp(0.0, BARE_LAND_SCORE_CAP);
    (vegetation + ndvi + bare).min(100.0)
}

/// Ecosystem improvement score (0-100) from band, NDVI and composition deltas
pub fn ecosystem_improvement_score(
    bands: &BandChanges,
    ndvi: &NdviChanges,
    composition: &CompositionChanges,
) -> f64 {
    let vegetation = (bands.healthy.max(0.0) * 1.5
        + bands.moderate.max(0.0)
        + (-bands.bare_land).max(0.0) * 0.5)
        .min(40.0);
    let ndvi = (ndvi.mean.max(0.0) * 100.0).min(30.0);
    let composition = ((-composition.soil).max(0.0) * 0.5 + composition.texture.max(0.0) * 0.1).min(30.0);

    (vegetation + ndvi + composition).clamp(0.0, 100.0)
}

/// Before/after comparison
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformationAnalyzer;

impl TransformationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Derive transformation metrics from a before/after pair
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ComputationError` if any derived value is not
    /// finite.
    pub fn compare(
        &self,
        before: &ImageAnalysisResult,
        after: &ImageAnalysisResult,
    ) -> Result<TransformationMetrics> {
        let before_coverage = before.vegetation.total_coverage;
        let after_coverage = after.vegetation.total_coverage;

        let vegetation_change = after_coverage - before_coverage;
        let vegetation_change_percentage = vegetation_change / before_coverage.max(1.0) * 100.0;
        let ndvi_improvement = after.ndvi.mean - before.ndvi.mean;
        let bare_land_reduction = before.vegetation.bare - after.vegetation.bare;

        let score = transformation_score(vegetation_change, ndvi_improvement, bare_land_reduction);
        let quality =
            TransformationQuality::assess(score, vegetation_change_percentage, ndvi_improvement);

        let vegetation_details = BandChanges {
            healthy: after.vegetation.healthy - before.vegetation.healthy,
            moderate: after.vegetation.moderate - before.vegetation.moderate,
            sparse: after.vegetation.sparse - before.vegetation.sparse,
            bare_land: after.vegetation.bare - before.vegetation.bare,
        };
        let ndvi_details = NdviChanges {
            mean: ndvi_improvement,
            max: after.ndvi.max - before.ndvi.max,
            std: after.ndvi.std - before.ndvi.std,
        };
        let composition_details = CompositionChanges {
            soil: after.composition.soil_percentage - before.composition.soil_percentage,
            water: after.composition.water_percentage - before.composition.water_percentage,
            texture: after.composition.texture_complexity - before.composition.texture_complexity,
        };

        let metrics = TransformationMetrics {
            before_vegetation_coverage: before_coverage,
            after_vegetation_coverage: after_coverage,
            vegetation_change_absolute: vegetation_change,
            vegetation_change_percentage,
            ndvi_improvement,
            bare_land_reduction,
            transformation_type: TransformationType::classify(before_coverage, after_coverage),
            transformation_score: score,
            transformation_quality: quality,
            ecosystem_improvement_score: ecosystem_improvement_score(
                &vegetation_details,
                &ndvi_details,
                &composition_details,
            ),
            vegetation_details,
            ndvi_details,
            composition_details,
            land_use_change: LandUseChange::classify(before, after),
        };

        metrics.validate()?;
        Ok(metrics)
    }

    /// Combine image, transformation and CO2 confidence into a verification score
    ///
    /// # Arguments
    ///
    /// * `metrics` - Output of [`TransformationAnalyzer::compare`]
    /// * `before`, `after` - The analysed images
    /// * `co2_confidence_factor` - Confidence factor (0.6-1.0) used by the CO2 estimate
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ComputationError` for a non-finite score.
    pub fn verification_score(
        &self,
        metrics: &TransformationMetrics,
        before: &ImageAnalysisResult,
        after: &ImageAnalysisResult,
        co2_confidence_factor: f64,
    ) -> Result<VerificationScore> {
        let image_confidence = (before.verification.confidence_score
            + after.verification.confidence_score)
            / 2.0;
        let quality = metrics.transformation_quality;
        let transformation_confidence =
            metrics.transformation_score * quality.verification_multiplier();
        let co2_confidence = co2_confidence_factor * 100.0;

        let [w_image, w_transformation, w_co2] = VERIFICATION_WEIGHTS;
        let overall = image_confidence * w_image
            + transformation_confidence * w_transformation
            + co2_confidence * w_co2;

        if !overall.is_finite() {
            return Err(AnalysisError::computation(
                "verification_scoring",
                format!("overall score is not finite (co2 factor {})", co2_confidence_factor),
            ));
        }

        Ok(VerificationScore {
            overall_score: overall,
            image_analysis_confidence: image_confidence,
            transformation_confidence,
            co2_calculation_confidence: co2_confidence,
            transformation_quality: quality,
            verification_level: VerificationLevel::from_score(overall),
            recommended_action: RecommendedAction::decide(overall, quality),
        })
    }
}
