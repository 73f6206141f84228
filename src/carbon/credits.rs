//! Credit calculation stages
//!
//! A single calculation moves through five stages, each a pure function of
//! the previous stage's output and the analysis:
//!
//! 1. **Base**: CO2 mass times the baseline rate, floored for productive projects
//! 2. **Quality-adjusted**: transformation quality, verification confidence and NDVI bonuses
//! 3. **Bonus-adjusted**: stacked project bonuses (exceptional, restoration, scale, ecosystem, biodiversity)
//! 4. **Validated**: clamped to the project floor and per-hectare ceiling, shrunk for low confidence
//! 5. **Distributed**: split into provisional (released now) and deferred credits
//!
//! Distribution is the only stage that can fail; [`CreditCalculator::fallback_distribution`]
//! provides the conservative split used in that case.

use crate::analysis::transformation::{
    TransformationMetrics, TransformationQuality, VerificationScore,
};
use crate::carbon::ecosystem::EcosystemType;
use crate::config::CreditSettings;
use crate::constants::credits::{FALLBACK_PROVISIONAL_PERCENTAGE, LEGACY_FIXED_CREDITS};
use crate::error::{AnalysisError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tier multipliers of the provisional share below the strict threshold
const GOOD_TIER_SHARE: f64 = 0.8;
const MODERATE_TIER_SHARE: f64 = 0.6;
const LOW_TIER_SHARE: f64 = 0.4;

/// Largest reduction applied at validation for low confidence
const MIN_VALIDATION_CONFIDENCE_MULTIPLIER: f64 = 0.5;

/// Optional caller-supplied project details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    /// Declared ecosystem, e.g. "mangrove"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecosystem_type: Option<String>,

    /// Other fields are carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectMetadata {
    pub fn with_ecosystem(ecosystem_type: impl Into<String>) -> Self {
        Self {
            ecosystem_type: Some(ecosystem_type.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// Whether the declared ecosystem earns the ecosystem bonus
    fn has_premium_ecosystem(&self) -> bool {
        self.ecosystem_type
            .as_deref()
            .and_then(|name| name.parse::<EcosystemType>().ok())
            .is_some_and(|ecosystem| ecosystem.has_premium_bonus())
    }
}

/// Credits after each stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditBreakdown {
    pub base_credits: f64,
    pub quality_adjusted_credits: f64,
    pub bonus_adjusted_credits: f64,
    pub final_validated_credits: f64,
}

/// Provisional/deferred split of the validated credits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditDistribution {
    pub total_credits: f64,
    pub provisional_credits: f64,
    /// `total_credits - provisional_credits`
    pub deferred_credits: f64,
    /// Within `[0, 0.5]`
    pub provisional_percentage: f64,
    pub verification_period_years: u32,
    pub monitoring_requirements: Vec<String>,
    /// `immediate` and `year_<N>` release amounts
    pub release_schedule: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the fixed-award scheme that predates image analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCredits {
    pub recommended_credits: f64,
    pub calculation_method: String,
    pub project_area_hectares: f64,
    pub calculation_summary: String,
}

/// Fixed award of the legacy scheme, independent of size or transformation
pub fn legacy_credits(project_area_hectares: f64) -> LegacyCredits {
    LegacyCredits {
        recommended_credits: LEGACY_FIXED_CREDITS,
        calculation_method: "legacy_fixed".to_string(),
        project_area_hectares,
        calculation_summary: format!(
            "Legacy calculation: Fixed {:.1} credits per project",
            LEGACY_FIXED_CREDITS
        ),
    }
}

/// Credit multiplier for each transformation quality
pub fn quality_multiplier(quality: TransformationQuality) -> f64 {
    match quality {
        TransformationQuality::Excellent => 1.3,
        TransformationQuality::VeryGood => 1.2,
        TransformationQuality::Good => 1.1,
        TransformationQuality::Moderate => 1.0,
        TransformationQuality::Minimal => 0.9,
        TransformationQuality::Poor => 0.7,
    }
}

/// Stage-by-stage credit calculator
#[derive(Debug, Clone)]
pub struct CreditCalculator {
    settings: CreditSettings,
}

impl Default for CreditCalculator {
    fn default() -> Self {
        Self {
            settings: CreditSettings::default(),
        }
    }
}

impl CreditCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a calculator with custom settings
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` if the settings fail validation.
    pub fn with_settings(settings: CreditSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &CreditSettings {
        &self.settings
    }

    /// Override settings by name, returning the keys that were not recognised
    pub fn update_settings(
        &mut self,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<String>> {
        let unknown = self.settings.apply_overrides(overrides)?;
        info!("Credit settings updated ({} unknown keys ignored)", unknown.len());
        Ok(unknown)
    }

    /// Stage 1: CO2 mass to credits
    pub fn base_credits(&self, co2_kg: f64) -> f64 {
        let base = co2_kg * self.settings.baseline_credit_rate;
        if co2_kg > 0.0 {
            base.max(self.settings.min_credits_per_project)
        } else {
            base
        }
    }

    /// Stage 2: quality, confidence and NDVI adjustments
    ///
    /// # Arguments
    ///
    /// * `credits` - Base credits
    /// * `quality` - Transformation quality label
    /// * `verification_confidence` - Overall verification score (0-100)
    /// * `ndvi_improvement` - Mean NDVI delta
    pub fn quality_adjusted(
        &self,
        credits: f64,
        quality: TransformationQuality,
        verification_confidence: f64,
        ndvi_improvement: f64,
    ) -> f64 {
        let mut adjusted = credits * quality_multiplier(quality);

        let threshold = self.settings.verification_confidence_threshold;
        if verification_confidence < threshold {
            adjusted *= verification_confidence / threshold;
        } else if verification_confidence > self.settings.high_confidence_bonus_threshold {
            adjusted *= 1.1;
        }

        if ndvi_improvement > 0.3 {
            adjusted *= 1.15;
        } else if ndvi_improvement > 0.2 {
            adjusted *= 1.08;
        }

        adjusted
    }

    /// Stage 3: multiplicative project bonuses
    ///
    /// Returns `credits` unchanged when bonuses are disabled.
    pub fn bonus_adjusted(
        &self,
        credits: f64,
        metrics: &TransformationMetrics,
        project_area_hectares: f64,
        metadata: Option<&ProjectMetadata>,
    ) -> f64 {
        if !self.settings.enable_bonus_credits {
            return credits;
        }

        let mut bonus = credits;
        if metrics.transformation_score > 85.0 {
            bonus *= 1.2;
        }
        if metrics.land_use_change.is_restoration_project {
            bonus *= 1.15;
        }
        if project_area_hectares > 20.0 {
            bonus *= (1.0 + (project_area_hectares - 20.0) * 0.002).min(1.1);
        }
        if metadata.is_some_and(ProjectMetadata::has_premium_ecosystem) {
            bonus *= 1.1;
        }
        if metrics.vegetation_details.healthy > 30.0 {
            bonus *= 1.1;
        }
        bonus
    }

    /// Stage 4: floor, per-hectare ceiling and low-confidence reduction
    ///
    /// Never exceeds `project_area_hectares * max_credits_per_hectare`. The
    /// per-project floor only applies to a positive amount, so a project
    /// without sequestered CO2 stays at zero.
    pub fn validated(&self, credits: f64, project_area_hectares: f64, verification_confidence: f64) -> f64 {
        let ceiling = project_area_hectares * self.settings.max_credits_per_hectare;
        let floored = if credits > 0.0 {
            credits.max(self.settings.min_credits_per_project)
        } else {
            credits
        };
        let mut validated = floored.min(ceiling);

        let threshold = self.settings.verification_confidence_threshold;
        if verification_confidence < threshold {
            let multiplier =
                (verification_confidence / threshold).max(MIN_VALIDATION_CONFIDENCE_MULTIPLIER);
            validated *= multiplier;
            info!("Applied confidence reduction: {:.2}x due to low verification score", multiplier);
        }

        let validated = validated.max(0.0);
        debug!("Credits validated: {:.2} -> {:.2}", credits, validated);
        validated
    }

    /// Share of credits released immediately
    pub fn provisional_percentage(&self, verification: &VerificationScore) -> f64 {
        let s = &self.settings;
        let confidence = verification.overall_score;

        if confidence >= s.strict_confidence_threshold && verification.verification_level.is_high() {
            s.provisional_credit_percentage
        } else if confidence >= s.good_confidence_tier {
            s.provisional_credit_percentage * GOOD_TIER_SHARE
        } else if confidence >= s.moderate_confidence_tier {
            s.provisional_credit_percentage * MODERATE_TIER_SHARE
        } else {
            s.provisional_credit_percentage * LOW_TIER_SHARE
        }
    }

    /// Stage 5: split validated credits into provisional and deferred
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::ComputationError` if `total_credits` is negative
    /// or not finite.
    pub fn distribute(
        &self,
        total_credits: f64,
        verification: &VerificationScore,
        quality: TransformationQuality,
    ) -> Result<CreditDistribution> {
        if !total_credits.is_finite() || total_credits < 0.0 {
            return Err(AnalysisError::computation(
                "credit_distribution",
                format!("cannot distribute {} credits", total_credits),
            ));
        }

        let percentage = self.provisional_percentage(verification);
        let provisional = total_credits * percentage;
        let deferred = total_credits - provisional;

        Ok(CreditDistribution {
            total_credits,
            provisional_credits: provisional,
            deferred_credits: deferred,
            provisional_percentage: percentage,
            verification_period_years: self.settings.provisional_verification_period_years,
            monitoring_requirements: self.monitoring_requirements(
                verification.overall_score,
                quality,
                total_credits,
            ),
            release_schedule: self.release_schedule(provisional, deferred),
            error: None,
        })
    }

    /// Conservative 20/80 split used when distribution fails
    ///
    /// Non-finite totals are treated as zero so the result stays numeric.
    pub fn fallback_distribution(&self, total_credits: f64, error: &AnalysisError) -> CreditDistribution {
        let total = if total_credits.is_finite() {
            total_credits.max(0.0)
        } else {
            0.0
        };
        let provisional = total * FALLBACK_PROVISIONAL_PERCENTAGE;
        let deferred = total - provisional;

        CreditDistribution {
            total_credits: total,
            provisional_credits: provisional,
            deferred_credits: deferred,
            provisional_percentage: FALLBACK_PROVISIONAL_PERCENTAGE,
            verification_period_years: self.settings.provisional_verification_period_years,
            monitoring_requirements: vec![
                "Enhanced monitoring required due to calculation error".to_string(),
            ],
            release_schedule: self.release_schedule(provisional, deferred),
            error: Some(error.to_string()),
        }
    }

    /// Monitoring obligations attached to the issued credits
    pub fn monitoring_requirements(
        &self,
        verification_confidence: f64,
        quality: TransformationQuality,
        total_credits: f64,
    ) -> Vec<String> {
        let mut requirements = vec![
            "Annual satellite imagery verification".to_string(),
            "Ground-truth validation within 18 months".to_string(),
        ];

        if verification_confidence < self.settings.enhanced_reporting_confidence {
            requirements.push("Quarterly progress reports with photographic evidence".to_string());
            requirements.push("Independent third-party verification required".to_string());
        }

        if total_credits > self.settings.continuous_monitoring_credit_threshold {
            requirements.push("Continuous remote sensing monitoring".to_string());
            requirements.push("Annual on-site inspection".to_string());
        }

        if matches!(quality, TransformationQuality::Minimal | TransformationQuality::Poor) {
            requirements.push("Enhanced monitoring with monthly updates".to_string());
            requirements.push("Corrective action plan if progress stalls".to_string());
        }

        requirements.push(format!(
            "Minimum {} month monitoring period",
            self.settings.minimum_monitoring_period_months
        ));
        requirements
    }

    fn release_schedule(&self, provisional: f64, deferred: f64) -> BTreeMap<String, f64> {
        let mut schedule = BTreeMap::new();
        schedule.insert("immediate".to_string(), provisional);
        schedule.insert(
            format!("year_{}", self.settings.provisional_verification_period_years),
            deferred,
        );
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::transformation::{RecommendedAction, VerificationLevel};

    fn verification(score: f64) -> VerificationScore {
        VerificationScore {
            overall_score: score,
            image_analysis_confidence: 70.0,
            transformation_confidence: 0.0,
            co2_calculation_confidence: 80.0,
            transformation_quality: TransformationQuality::Good,
            verification_level: VerificationLevel::from_score(score),
            recommended_action: RecommendedAction::decide(score, TransformationQuality::Good),
        }
    }

    #[test]
    fn test_base_credits_floor() {
        let calc = CreditCalculator::new();
        assert_eq!(calc.base_credits(0.0), 0.0);
        assert_eq!(calc.base_credits(1.0), 0.5);
        assert!((calc.base_credits(1000.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_adjustments() {
        let calc = CreditCalculator::new();

        // Neutral quality, in-band confidence, no NDVI bonus
        assert_eq!(calc.quality_adjusted(100.0, TransformationQuality::Moderate, 80.0, 0.0), 100.0);

        // Excellent, high confidence and strong NDVI
        let adjusted = calc.quality_adjusted(100.0, TransformationQuality::Excellent, 95.0, 0.35);
        assert!((adjusted - 100.0 * 1.3 * 1.1 * 1.15).abs() < 1e-9);

        // Low confidence scales linearly
        let adjusted = calc.quality_adjusted(100.0, TransformationQuality::Moderate, 35.0, 0.25);
        assert!((adjusted - 100.0 * 0.5 * 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_bonuses_stack() {
        let calc = CreditCalculator::new();
        let mut metrics = TransformationMetrics::neutral();
        metrics.transformation_score = 90.0;
        metrics.land_use_change.is_restoration_project = true;
        metrics.vegetation_details.healthy = 40.0;
        let metadata = ProjectMetadata::with_ecosystem("Mangrove");

        let bonus = calc.bonus_adjusted(100.0, &metrics, 100.0, Some(&metadata));
        let expected = 100.0 * 1.2 * 1.15 * 1.1 * 1.1 * 1.1;
        assert!((bonus - expected).abs() < 1e-9);

        // Scale bonus is linear above 20 ha
        let plain = TransformationMetrics::neutral();
        assert!((calc.bonus_adjusted(100.0, &plain, 30.0, None) - 102.0).abs() < 1e-9);
        assert_eq!(calc.bonus_adjusted(100.0, &plain, 10.0, None), 100.0);
    }

    #[test]
    fn test_bonuses_can_be_disabled() {
        let settings = CreditSettings {
            enable_bonus_credits: false,
            ..CreditSettings::default()
        };
        let calc = CreditCalculator::with_settings(settings).unwrap();
        let mut metrics = TransformationMetrics::neutral();
        metrics.transformation_score = 99.0;
        assert_eq!(calc.bonus_adjusted(10.0, &metrics, 100.0, None), 10.0);
    }

    #[test]
    fn test_validation_clamps() {
        let calc = CreditCalculator::new();

        assert_eq!(calc.validated(10_000.0, 5.0, 80.0), 175.0);
        assert_eq!(calc.validated(0.01, 5.0, 80.0), 0.5);
        // Nothing sequestered: the floor is skipped
        assert_eq!(calc.validated(0.0, 5.0, 80.0), 0.0);
        assert_eq!(calc.validated(0.0, 5.0, 20.0), 0.0);
        // Low confidence multiplier never goes below 0.5
        assert_eq!(calc.validated(100.0, 5.0, 14.0), 50.0);
        assert!((calc.validated(100.0, 5.0, 56.0) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_provisional_tiers() {
        let calc = CreditCalculator::new();
        assert_eq!(calc.provisional_percentage(&verification(90.0)), 0.5);
        assert!((calc.provisional_percentage(&verification(84.0)) - 0.4).abs() < 1e-12);
        assert!((calc.provisional_percentage(&verification(65.0)) - 0.3).abs() < 1e-12);
        assert!((calc.provisional_percentage(&verification(20.0)) - 0.2).abs() < 1e-12);

        // Strict threshold met but level below the top tier
        let mut gated = verification(90.0);
        gated.verification_level = VerificationLevel::GoodConfidence;
        assert!((calc.provisional_percentage(&gated) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_distribution_sums_to_total() {
        let calc = CreditCalculator::new();
        let distribution = calc
            .distribute(175.0, &verification(84.0), TransformationQuality::Excellent)
            .unwrap();

        assert!((distribution.provisional_credits - 70.0).abs() < 1e-9);
        assert!(
            (distribution.provisional_credits + distribution.deferred_credits - 175.0).abs() < 1e-9
        );
        assert_eq!(distribution.release_schedule.get("immediate"), Some(&distribution.provisional_credits));
        assert_eq!(distribution.release_schedule.get("year_3"), Some(&distribution.deferred_credits));
        assert!(distribution.error.is_none());
    }

    #[test]
    fn test_distribution_rejects_nan() {
        let calc = CreditCalculator::new();
        let err = calc
            .distribute(f64::NAN, &verification(84.0), TransformationQuality::Good)
            .unwrap_err();

        let fallback = calc.fallback_distribution(f64::NAN, &err);
        assert_eq!(fallback.total_credits, 0.0);
        assert_eq!(fallback.provisional_percentage, 0.2);
        assert!(fallback.error.is_some());

        let fallback = calc.fallback_distribution(50.0, &err);
        assert_eq!(fallback.provisional_credits, 10.0);
        assert_eq!(fallback.deferred_credits, 40.0);
    }

    #[test]
    fn test_monitoring_requirements() {
        let calc = CreditCalculator::new();

        let minimal = calc.monitoring_requirements(90.0, TransformationQuality::Excellent, 100.0);
        assert_eq!(
            minimal,
            vec![
                "Annual satellite imagery verification",
                "Ground-truth validation within 18 months",
                "Minimum 12 month monitoring period",
            ]
        );

        let full = calc.monitoring_requirements(50.0, TransformationQuality::Poor, 5000.0);
        assert_eq!(full.len(), 9);
        assert!(full.contains(&"Continuous remote sensing monitoring".to_string()));
        assert!(full.contains(&"Enhanced monitoring with monthly updates".to_string()));
    }

    #[test]
    fn test_legacy_credits() {
        let legacy = legacy_credits(12.0);
        assert_eq!(legacy.recommended_credits, 100.0);
        assert_eq!(legacy.calculation_method, "legacy_fixed");
    }

    #[test]
    fn test_update_settings() {
        let mut calc = CreditCalculator::new();
        let overrides = serde_json::json!({ "max_credits_per_hectare": 20.0, "bogus": 1 });
        let unknown = calc.update_settings(overrides.as_object().unwrap()).unwrap();

        assert_eq!(unknown, vec!["bogus".to_string()]);
        assert_eq!(calc.settings().max_credits_per_hectare, 20.0);
    }

    #[test]
    fn test_metadata_ecosystem_bonus() {
        assert!(ProjectMetadata::with_ecosystem("salt_marsh").has_premium_ecosystem());
        assert!(!ProjectMetadata::with_ecosystem("seagrass").has_premium_ecosystem());
        assert!(!ProjectMetadata::with_ecosystem("unknown").has_premium_ecosystem());
        assert!(!ProjectMetadata::default().has_premium_ecosystem());
    }
}
