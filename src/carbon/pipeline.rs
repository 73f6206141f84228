//! End-to-end credit calculation for a before/after image pair
//!
//! Input errors (undecodable images, non-positive area or period) are returned
//! before any analysis runs. Once both images are decoded the pipeline always
//! produces numbers: a failing analysis stage is replaced by its neutral
//! default and listed in [`SupportingAnalysis::degradations`], and a failing
//! distribution falls back to a conservative split with `success: false`.

use crate::analysis::greenness::{GreenProgress, GreennessAnalyzer};
use crate::analysis::health::ImageAnalysisResult;
use crate::analysis::transformation::{
    RecommendedAction, TransformationAnalyzer, TransformationMetrics, VerificationLevel,
    VerificationScore,
};
use crate::analysis::{Degradation, ImageAnalyzer};
use crate::carbon::credits::{
    CreditBreakdown, CreditCalculator, CreditDistribution, ProjectMetadata,
};
use crate::carbon::ecosystem::EcosystemType;
use crate::carbon::report::{calculation_summary, comparison_report};
use crate::carbon::sequestration::{
    check_positive, default_carbon_credits, CarbonCredits, Co2Calculator, Co2Result,
};
use crate::config::PipelineConfig;
use crate::error::{AnalysisError, Result};
use crate::image_loader::load_image_bytes;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

/// Period assumed by callers that do not supply one
pub const DEFAULT_TIME_PERIOD_YEARS: f64 = 1.0;

const BEFORE_LABEL: &str = "before_image";
const AFTER_LABEL: &str = "after_image";

/// Inputs that determined the credit count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationFactors {
    pub co2_sequestration_kg: f64,
    pub base_credit_rate: f64,
    pub transformation_quality: String,
    pub transformation_score: f64,
    pub vegetation_change_percentage: f64,
    pub ndvi_improvement: f64,
    pub verification_confidence: f64,
    pub ecosystem_type: EcosystemType,
    pub confidence_factor: f64,
    pub area_factor: f64,
    pub transformation_multiplier: f64,
    pub greenery_multiplier: f64,
}

/// Intermediate results kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingAnalysis {
    pub before_analysis: ImageAnalysisResult,
    pub after_analysis: ImageAnalysisResult,
    pub transformation_metrics: TransformationMetrics,
    pub co2_sequestration: Co2Result,
    pub verification_score: VerificationScore,
    /// CO2 mass converted at the default rate, for comparison
    pub carbon_credits: CarbonCredits,
    pub green_progress: GreenProgress,
    pub analysis_report: String,
    /// Stages replaced by neutral defaults, empty on a clean run
    pub degradations: Vec<Degradation>,
}

/// Result of a credit calculation
///
/// Numeric fields are always populated, including on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCalculationResult {
    pub success: bool,
    pub recommended_credits: f64,
    pub provisional_credits: f64,
    pub deferred_credits: f64,
    pub calculation_method: String,
    pub project_area_hectares: f64,
    pub time_period_years: f64,
    pub credit_breakdown: CreditBreakdown,
    pub credit_distribution: CreditDistribution,
    pub monitoring_requirements: Vec<String>,
    pub verification_confidence: f64,
    pub verification_level: VerificationLevel,
    pub recommended_action: RecommendedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_factors: Option<CalculationFactors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_analysis: Option<Box<SupportingAnalysis>>,
    pub calculation_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreditCalculationResult {
    /// Zero-credit result for callers that need numbers even when the
    /// calculation could not start
    pub fn from_error(error: &AnalysisError, project_area_hectares: f64, time_period_years: f64) -> Self {
        let distribution = CreditCalculator::default().fallback_distribution(0.0, error);
        Self {
            success: false,
            recommended_credits: 0.0,
            provisional_credits: 0.0,
            deferred_credits: 0.0,
            calculation_method: "error".to_string(),
            project_area_hectares,
            time_period_years,
            credit_breakdown: CreditBreakdown {
                base_credits: 0.0,
                quality_adjusted_credits: 0.0,
                bonus_adjusted_credits: 0.0,
                final_validated_credits: 0.0,
            },
            monitoring_requirements: distribution.monitoring_requirements.clone(),
            credit_distribution: distribution,
            verification_confidence: 0.0,
            verification_level: VerificationLevel::Insufficient,
            recommended_action: RecommendedAction::RequireManualReview,
            calculation_factors: None,
            supporting_analysis: None,
            calculation_summary: format!("Credit calculation failed: {}", error),
            error: Some(error.to_string()),
        }
    }
}

/// Credit pipeline with its configuration
pub struct DynamicCreditCalculator {
    config: PipelineConfig,
    analyzer: ImageAnalyzer,
    transformation: TransformationAnalyzer,
    sequestration: Co2Calculator,
    credits: CreditCalculator,
    greenness: GreennessAnalyzer,
}

impl Default for DynamicCreditCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicCreditCalculator {
    pub fn new() -> Self {
        let config = PipelineConfig::default();
        Self {
            analyzer: ImageAnalyzer::with_config(config.clone()),
            transformation: TransformationAnalyzer::new(),
            sequestration: Co2Calculator::with_config(config.sequestration.clone()),
            credits: CreditCalculator::default(),
            greenness: GreennessAnalyzer::new(),
            config,
        }
    }

    /// Create a pipeline from a custom configuration
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` if the configuration fails
    /// validation.
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: ImageAnalyzer::with_config(config.clone()),
            transformation: TransformationAnalyzer::new(),
            sequestration: Co2Calculator::with_config(config.sequestration.clone()),
            credits: CreditCalculator::with_settings(config.credits.clone())?,
            greenness: GreennessAnalyzer::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn credit_calculator(&self) -> &CreditCalculator {
        &self.credits
    }

    /// Calculate credits for a before/after photo pair
    ///
    /// # Arguments
    ///
    /// * `before_image`, `after_image` - Encoded images as read by the caller
    /// * `project_area_hectares` - Project area, > 0
    /// * `time_period_years` - Period between the photos, > 0
    /// * `metadata` - Optional project details (declared ecosystem)
    ///
    /// # Returns
    ///
    /// The credit result. `success` is false only when distribution failed,
    /// in which case a 20/80 fallback split and `error` are reported.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` for a non-positive or
    /// non-finite area or period, and `AnalysisError::ImageLoadError` or
    /// `AnalysisError::EmptyImage` if either image cannot be decoded.
    pub fn calculate(
        &self,
        before_image: &[u8],
        after_image: &[u8],
        project_area_hectares: f64,
        time_period_years: f64,
        metadata: Option<&ProjectMetadata>,
    ) -> Result<CreditCalculationResult> {
        check_positive("project_area_hectares", project_area_hectares)?;
        check_positive("time_period_years", time_period_years)?;

        info!(
            "Starting credit calculation: {:.2} ha over {:.1} years",
            project_area_hectares, time_period_years
        );

        let before_pixels = load_image_bytes(before_image, &self.config.image)?.pixels;
        let after_pixels = load_image_bytes(after_image, &self.config.image)?.pixels;

        let before = self.analyzer.analyze(&before_pixels, BEFORE_LABEL);
        let after = self.analyzer.analyze(&after_pixels, AFTER_LABEL);
        let shapes = format!(
            "before {}x{}, after {}x{}",
            before_pixels.width(),
            before_pixels.height(),
            after_pixels.width(),
            after_pixels.height()
        );

        let mut degradations: Vec<Degradation> = before
            .degradations
            .iter()
            .chain(after.degradations.iter())
            .cloned()
            .collect();

        let metrics = match self.transformation.compare(&before, &after) {
            Ok(metrics) => metrics,
            Err(e) => {
                degradations.push(Degradation::record("transformation_analysis", &e, &shapes));
                TransformationMetrics::neutral()
            }
        };

        let co2 = match self.sequestration.calculate(
            &before,
            &after,
            &metrics,
            project_area_hectares,
            time_period_years,
        ) {
            Ok(co2) => co2,
            Err(e) if e.is_recoverable() => {
                degradations.push(Degradation::record("co2_sequestration", &e, &shapes));
                Co2Result::neutral(
                    project_area_hectares,
                    time_period_years,
                    self.config.sequestration.area_fraction_transformed,
                )
            }
            Err(e) => return Err(e),
        };

        let verification = match self.transformation.verification_score(
            &metrics,
            &before,
            &after,
            co2.confidence_factor,
        ) {
            Ok(score) => score,
            Err(e) => {
                degradations.push(Degradation::record("verification_scoring", &e, &shapes));
                VerificationScore::insufficient(metrics.transformation_quality)
            }
        };

        let green_progress = self.greenness.progress(&before_pixels, &after_pixels);

        let calc = &self.credits;
        let base = calc.base_credits(co2.co2_sequestration_kg);
        let quality = calc.quality_adjusted(
            base,
            metrics.transformation_quality,
            verification.overall_score,
            metrics.ndvi_improvement,
        );
        let bonus = calc.bonus_adjusted(quality, &metrics, project_area_hectares, metadata);
        let validated = calc.validated(bonus, project_area_hectares, verification.overall_score);
        let breakdown = CreditBreakdown {
            base_credits: base,
            quality_adjusted_credits: quality,
            bonus_adjusted_credits: bonus,
            final_validated_credits: validated,
        };
        debug!(
            "Credit stages: base {:.2}, quality {:.2}, bonus {:.2}, validated {:.2}",
            base, quality, bonus, validated
        );

        let distribution = match calc.distribute(validated, &verification, metrics.transformation_quality) {
            Ok(distribution) => distribution,
            Err(e) => {
                error!("Credit distribution failed ({}), using fallback split: {}", shapes, e);
                calc.fallback_distribution(validated, &e)
            }
        };

        let factors = CalculationFactors {
            co2_sequestration_kg: co2.co2_sequestration_kg,
            base_credit_rate: calc.settings().baseline_credit_rate,
            transformation_quality: metrics.transformation_quality.as_str().to_string(),
            transformation_score: metrics.transformation_score,
            vegetation_change_percentage: metrics.vegetation_change_percentage,
            ndvi_improvement: metrics.ndvi_improvement,
            verification_confidence: verification.overall_score,
            ecosystem_type: co2.ecosystem_type,
            confidence_factor: co2.confidence_factor,
            area_factor: co2.area_factor,
            transformation_multiplier: co2.transformation_multiplier,
            greenery_multiplier: co2.greenery_multiplier,
        };

        let summary = calculation_summary(&co2, &metrics, &verification, &breakdown);
        let supporting = SupportingAnalysis {
            carbon_credits: default_carbon_credits(co2.co2_sequestration_kg),
            analysis_report: comparison_report(&metrics, &co2),
            before_analysis: before,
            after_analysis: after,
            transformation_metrics: metrics,
            co2_sequestration: co2,
            verification_score: verification.clone(),
            green_progress,
            degradations,
        };

        let result = CreditCalculationResult {
            success: distribution.error.is_none(),
            recommended_credits: distribution.total_credits,
            provisional_credits: distribution.provisional_credits,
            deferred_credits: distribution.deferred_credits,
            calculation_method: "dynamic_ai_analysis".to_string(),
            project_area_hectares,
            time_period_years,
            credit_breakdown: breakdown,
            monitoring_requirements: distribution.monitoring_requirements.clone(),
            error: distribution.error.clone(),
            credit_distribution: distribution,
            verification_confidence: verification.overall_score,
            verification_level: verification.verification_level,
            recommended_action: verification.recommended_action,
            calculation_factors: Some(factors),
            supporting_analysis: Some(Box::new(supporting)),
            calculation_summary: summary,
        };

        info!(
            "Credit calculation complete: {:.2} credits ({:.2} provisional, {:.2} deferred), {}",
            result.recommended_credits,
            result.provisional_credits,
            result.deferred_credits,
            result.verification_level
        );
        Ok(result)
    }
}

/// Calculate credits with the default configuration
///
/// See [`DynamicCreditCalculator::calculate`].
///
/// # Example
///
/// ```rust,no_run
/// use blue_carbon_credits::calculate_dynamic_credits;
///
/// let before = std::fs::read("site_2022.jpg").unwrap();
/// let after = std::fs::read("site_2024.jpg").unwrap();
/// let result = calculate_dynamic_credits(&before, &after, 5.0, 2.0, None)?;
/// println!("{:.2} credits ({:.2} provisional)", result.recommended_credits, result.provisional_credits);
/// # Ok::<(), blue_carbon_credits::AnalysisError>(())
/// ```
pub fn calculate_dynamic_credits(
    before_image: &[u8],
    after_image: &[u8],
    project_area_hectares: f64,
    time_period_years: f64,
    metadata: Option<&ProjectMetadata>,
) -> Result<CreditCalculationResult> {
    DynamicCreditCalculator::new().calculate(
        before_image,
        after_image,
        project_area_hectares,
        time_period_years,
        metadata,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn site(green_rows: u32) -> Vec<u8> {
        png(&RgbImage::from_fn(20, 10, |_, y| {
            if y < green_rows {
                Rgb([34, 139, 34])
            } else {
                Rgb([150, 100, 50])
            }
        }))
    }

    #[test]
    fn test_rejects_bad_parameters_before_decoding() {
        let calc = DynamicCreditCalculator::new();
        let err = calc.calculate(b"x", b"x", 0.0, 1.0, None).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));

        let err = calc.calculate(b"x", b"x", 1.0, f64::NAN, None).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));

        let err = calc.calculate(b"x", &site(5), 1.0, 1.0, None).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageLoadError { .. }));
    }

    #[test]
    fn test_clean_run_has_no_degradations() {
        let result = calculate_dynamic_credits(&site(1), &site(7), 5.0, 2.0, None).unwrap();
        let supporting = result.supporting_analysis.as_ref().unwrap();

        assert!(result.success);
        assert!(result.error.is_none());
        assert!(supporting.degradations.is_empty());
        assert_eq!(result.calculation_method, "dynamic_ai_analysis");
        assert_eq!(result.credit_breakdown.final_validated_credits, result.recommended_credits);
        assert_eq!(result.monitoring_requirements, result.credit_distribution.monitoring_requirements);
    }

    #[test]
    fn test_metadata_ecosystem_bonus_applies() {
        let plain = calculate_dynamic_credits(&site(5), &site(6), 1000.0, 1.0, None).unwrap();
        let mangrove = ProjectMetadata::with_ecosystem("mangrove");
        let boosted =
            calculate_dynamic_credits(&site(5), &site(6), 1000.0, 1.0, Some(&mangrove)).unwrap();

        let ratio = boosted.credit_breakdown.bonus_adjusted_credits
            / plain.credit_breakdown.bonus_adjusted_credits;
        assert!((ratio - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.credits.provisional_credit_percentage = 0.9;
        assert!(DynamicCreditCalculator::with_config(config).is_err());
    }

    #[test]
    fn test_overflowing_co2_degrades_to_neutral() {
        // Finite inputs whose CO2 product overflows to infinity
        let result = calculate_dynamic_credits(&site(1), &site(7), 1e300, 1e10, None).unwrap();
        let supporting = result.supporting_analysis.as_ref().unwrap();

        assert!(result.success);
        assert_eq!(supporting.degradations.len(), 1);
        assert_eq!(supporting.degradations[0].stage, "co2_sequestration");
        assert!(supporting.degradations[0].reason.contains("invalid CO2 estimate"));
        assert_eq!(supporting.co2_sequestration.co2_sequestration_kg, 0.0);
        assert_eq!(supporting.co2_sequestration.ecosystem_type, EcosystemType::DegradedRecovery);
        assert_eq!(result.recommended_credits, 0.0);
    }

    #[test]
    fn test_unbounded_credits_use_fallback_split() {
        let mut config = PipelineConfig::default();
        config.credits.baseline_credit_rate = f64::MAX;
        config.credits.max_credits_per_hectare = f64::INFINITY;
        let calc = DynamicCreditCalculator::with_config(config).unwrap();

        let result = calc.calculate(&site(1), &site(7), 5.0, 2.0, None).unwrap();
        let supporting = result.supporting_analysis.as_ref().unwrap();

        assert!(!result.success);
        assert!(result.credit_breakdown.final_validated_credits.is_infinite());
        assert!(result.error.as_deref().unwrap().contains("credit_distribution"));
        assert_eq!(result.credit_distribution.provisional_percentage, 0.2);
        assert_eq!(result.recommended_credits, 0.0);
        assert_eq!(result.provisional_credits + result.deferred_credits, 0.0);
        assert_eq!(
            result.monitoring_requirements,
            vec!["Enhanced monitoring required due to calculation error".to_string()]
        );
        // Analysis stages themselves ran cleanly
        assert!(supporting.degradations.is_empty());
        assert!(supporting.co2_sequestration.co2_sequestration_kg > 0.0);
    }

    #[test]
    fn test_from_error_is_numeric() {
        let err = AnalysisError::invalid_parameter("project_area_hectares", -1.0);
        let result = CreditCalculationResult::from_error(&err, -1.0, 1.0);

        assert!(!result.success);
        assert_eq!(result.recommended_credits, 0.0);
        assert_eq!(result.provisional_credits + result.deferred_credits, 0.0);
        assert!(result.error.is_some());
        assert!(result.supporting_analysis.is_none());
    }
}
