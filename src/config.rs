//! Configuration structures for the credit calculation pipeline.
//!
//! This module defines all tunable parameters for vegetation analysis,
//! CO2 estimation and credit issuance, organized into logical groups.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use blue_carbon_credits::PipelineConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = PipelineConfig::from_json_file(Path::new("config.json"))?;
//!
//! // Or use defaults
//! let config = PipelineConfig::default();
//! # Ok::<(), blue_carbon_credits::AnalysisError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`ImageConfig`]: downscaling limits applied after decoding
//! - [`VegetationConfig`]: color-space and NDVI thresholds
//! - [`SequestrationConfig`]: greenery-change blending and barren-land dampening
//! - [`CreditSettings`]: credit floors, caps and provisional distribution tiers
//!
//! Every section falls back to its defaults when omitted, so a config file only
//! needs to name the values it changes.

use crate::constants::{credits, ndvi, processing, vegetation};
use crate::error::{AnalysisError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete pipeline configuration.
///
/// Can be serialized to/from JSON for reproducible calculations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Image preprocessing configuration
    pub image: ImageConfig,

    /// Vegetation detection configuration
    pub vegetation: VegetationConfig,

    /// CO2 sequestration configuration
    pub sequestration: SequestrationConfig,

    /// Credit calculation configuration
    pub credits: CreditSettings,
}

/// Downscaling applied to decoded images before analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Images with a side larger than this are downscaled
    pub max_dimension: u32,

    /// Bounding box width for downscaled images
    pub resize_width: u32,

    /// Bounding box height for downscaled images
    pub resize_height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_dimension: processing::MAX_ANALYSIS_DIMENSION,
            resize_width: processing::ANALYSIS_RESIZE_WIDTH,
            resize_height: processing::ANALYSIS_RESIZE_HEIGHT,
        }
    }
}

/// Vegetation detection and NDVI banding parameters.
///
/// HSV values use 8-bit units (hue 0-179, saturation/value 0-255).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    /// Inclusive green hue window
    pub hue_min: u8,
    pub hue_max: u8,

    /// Exclusive saturation floor
    pub min_saturation: u8,

    /// Exclusive value floor
    pub min_value: u8,

    /// Pixels with 8-bit a* strictly below this are vegetation
    pub lab_neutral_a: u8,

    /// Blue contribution to the near-infrared proxy
    pub nir_blue_weight: f64,

    /// NDVI thresholds for the health bands
    pub healthy_threshold: f64,
    pub moderate_threshold: f64,

    /// Per-pixel NDVI threshold for mangrove-like canopy
    pub mangrove_pixel_threshold: f64,

    /// Minimum mangrove-like pixel share (%) to raise the indicator
    pub mangrove_likelihood_threshold: f64,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            hue_min: vegetation::HUE_MIN,
            hue_max: vegetation::HUE_MAX,
            min_saturation: vegetation::MIN_SATURATION,
            min_value: vegetation::MIN_VALUE,
            lab_neutral_a: vegetation::LAB_NEUTRAL_A,
            nir_blue_weight: vegetation::NIR_BLUE_WEIGHT,
            healthy_threshold: ndvi::HEALTHY_THRESHOLD,
            moderate_threshold: ndvi::MODERATE_THRESHOLD,
            mangrove_pixel_threshold: ndvi::MANGROVE_PIXEL_THRESHOLD,
            mangrove_likelihood_threshold: ndvi::MANGROVE_LIKELIHOOD_THRESHOLD,
        }
    }
}

/// Greenery-change and CO2 parameters.
///
/// The barren-land values are empirically tuned; they suppress credit issuance
/// when both photos show essentially no vegetation and the measured change is
/// image noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequestrationConfig {
    /// Coverage (%) below which both images count as barren
    pub barren_coverage_threshold: f64,

    /// After/before coverage ratio that must be exceeded for any barren credit
    pub barren_relative_gain: f64,

    /// Greenery change cap (%) for barren-to-barren pairs that did improve
    pub barren_marginal_cap: f64,

    /// Coverage (%) below which both images count as low-vegetation
    pub low_coverage_threshold: f64,

    /// Greenery change cap (%) for low-vegetation pairs
    pub low_coverage_cap: f64,

    /// Clamp applied to the final greenery change (%)
    pub min_greenery_change: f64,
    pub max_greenery_change: f64,

    /// Blend between relative coverage change and NDVI delta
    pub coverage_weight: f64,
    pub ndvi_weight: f64,

    /// Down-weighting of the transformation-type multiplier
    pub transformation_weight: f64,

    /// Extra weight of the biomass component
    pub biomass_weight: f64,

    /// Share of the project area that was actually restored
    pub area_fraction_transformed: f64,
}

impl Default for SequestrationConfig {
    fn default() -> Self {
        Self {
            barren_coverage_threshold: 5.0,
            barren_relative_gain: 1.2,
            barren_marginal_cap: 3.0,
            low_coverage_threshold: 10.0,
            low_coverage_cap: 15.0,
            min_greenery_change: -50.0,
            max_greenery_change: 150.0,
            coverage_weight: 0.8,
            ndvi_weight: 0.2,
            transformation_weight: 0.5,
            biomass_weight: 1.2,
            area_fraction_transformed: 1.0,
        }
    }
}

/// Credit issuance parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditSettings {
    /// Floor applied to any project that produced CO2, and at validation
    pub min_credits_per_project: f64,

    /// Ceiling per hectare of project area
    pub max_credits_per_hectare: f64,

    /// Credits per kg CO2
    pub baseline_credit_rate: f64,

    /// Verification confidence below which credits are scaled down
    pub verification_confidence_threshold: f64,

    /// Verification confidence above which a 1.1x bonus applies
    pub high_confidence_bonus_threshold: f64,

    /// Apply the project bonus stage
    pub enable_bonus_credits: bool,

    /// Share released immediately at the highest tier (at most 0.5)
    pub provisional_credit_percentage: f64,

    /// Years until deferred credits are re-verified
    pub provisional_verification_period_years: u32,

    /// Confidence required for the full provisional share
    pub strict_confidence_threshold: f64,

    /// Lower distribution tiers (80% and 60% of the full share)
    pub good_confidence_tier: f64,
    pub moderate_confidence_tier: f64,

    /// Confidence below which extra reporting is required
    pub enhanced_reporting_confidence: f64,

    /// Credit total above which continuous monitoring is required
    pub continuous_monitoring_credit_threshold: f64,

    /// Minimum monitoring period written into every requirement list
    pub minimum_monitoring_period_months: u32,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            min_credits_per_project: credits::MIN_CREDITS_PER_PROJECT,
            max_credits_per_hectare: credits::MAX_CREDITS_PER_HECTARE,
            baseline_credit_rate: credits::BASELINE_CREDIT_RATE,
            verification_confidence_threshold: credits::VERIFICATION_CONFIDENCE_THRESHOLD,
            high_confidence_bonus_threshold: credits::HIGH_CONFIDENCE_BONUS_THRESHOLD,
            enable_bonus_credits: true,
            provisional_credit_percentage: credits::PROVISIONAL_CREDIT_PERCENTAGE,
            provisional_verification_period_years: credits::PROVISIONAL_VERIFICATION_PERIOD_YEARS,
            strict_confidence_threshold: credits::STRICT_CONFIDENCE_THRESHOLD,
            good_confidence_tier: 70.0,
            moderate_confidence_tier: 60.0,
            enhanced_reporting_confidence: 80.0,
            continuous_monitoring_credit_threshold: 1000.0,
            minimum_monitoring_period_months: credits::MINIMUM_MONITORING_PERIOD_MONTHS,
        }
    }
}

impl CreditSettings {
    /// Check that the settings describe a usable calculator
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.provisional_credit_percentage) {
            return Err(AnalysisError::invalid_parameter(
                "provisional_credit_percentage",
                self.provisional_credit_percentage,
            ));
        }
        if !(self.min_credits_per_project >= 0.0) {
            return Err(AnalysisError::invalid_parameter(
                "min_credits_per_project",
                self.min_credits_per_project,
            ));
        }
        if !(self.max_credits_per_hectare > 0.0) {
            return Err(AnalysisError::invalid_parameter(
                "max_credits_per_hectare",
                self.max_credits_per_hectare,
            ));
        }
        if !(self.baseline_credit_rate > 0.0) {
            return Err(AnalysisError::invalid_parameter(
                "baseline_credit_rate",
                self.baseline_credit_rate,
            ));
        }
        if !(self.verification_confidence_threshold > 0.0) {
            return Err(AnalysisError::invalid_parameter(
                "verification_confidence_threshold",
                self.verification_confidence_threshold,
            ));
        }
        if !(self.strict_confidence_threshold >= self.good_confidence_tier
            && self.good_confidence_tier >= self.moderate_confidence_tier)
        {
            return Err(AnalysisError::invalid_parameter(
                "confidence_tiers",
                format!(
                    "{}/{}/{}",
                    self.strict_confidence_threshold,
                    self.good_confidence_tier,
                    self.moderate_confidence_tier
                ),
            ));
        }
        Ok(())
    }

    /// Override individual settings by name.
    ///
    /// Unknown keys are skipped with a warning and returned to the caller.
    /// The settings are left untouched if the result fails validation.
    pub fn apply_overrides(
        &mut self,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<String>> {
        let mut current = serde_json::to_value(&*self)
            .map_err(|e| AnalysisError::config("Failed to serialize credit settings", e))?;
        let mut unknown = Vec::new();

        if let Some(fields) = current.as_object_mut() {
            for (key, value) in overrides {
                if fields.contains_key(key) {
                    fields.insert(key.clone(), value.clone());
                } else {
                    warn!("Unknown credit setting: {}", key);
                    unknown.push(key.clone());
                }
            }
        }

        let updated: CreditSettings = serde_json::from_value(current)
            .map_err(|e| AnalysisError::config("Invalid credit setting value", e))?;
        updated.validate()?;
        *self = updated;

        Ok(unknown)
    }
}

impl PipelineConfig {
    /// Check every section for inconsistent values
    pub fn validate(&self) -> Result<()> {
        if self.image.max_dimension == 0
            || self.image.resize_width == 0
            || self.image.resize_height == 0
        {
            return Err(AnalysisError::invalid_parameter(
                "image",
                format!("{:?}", self.image),
            ));
        }
        if self.vegetation.hue_min > self.vegetation.hue_max {
            return Err(AnalysisError::invalid_parameter(
                "vegetation.hue_min",
                self.vegetation.hue_min,
            ));
        }
        if self.vegetation.moderate_threshold > self.vegetation.healthy_threshold {
            return Err(AnalysisError::invalid_parameter(
                "vegetation.moderate_threshold",
                self.vegetation.moderate_threshold,
            ));
        }
        let fraction = self.sequestration.area_fraction_transformed;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(AnalysisError::invalid_parameter(
                "sequestration.area_fraction_transformed",
                fraction,
            ));
        }
        if self.sequestration.min_greenery_change > self.sequestration.max_greenery_change {
            return Err(AnalysisError::invalid_parameter(
                "sequestration.min_greenery_change",
                self.sequestration.min_greenery_change,
            ));
        }
        self.credits.validate()
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::config(format!("Failed to read {}", path.display()), e)
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            AnalysisError::config(format!("Failed to parse {}", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::config("Failed to serialize configuration", e))?;
        std::fs::write(path, json).map_err(|e| {
            AnalysisError::config(format!("Failed to write {}", path.display()), e)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.credits.max_credits_per_hectare, 35.0);
        assert_eq!(config.sequestration.barren_coverage_threshold, 5.0);
        assert_eq!(config.image.max_dimension, 1024);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::default();
        config.credits.min_credits_per_project = 1.0;
        config.to_json_file(&path).unwrap();

        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "credits": { "max_credits_per_hectare": 20.0 } }"#).unwrap();
        assert_eq!(config.credits.max_credits_per_hectare, 20.0);
        assert_eq!(config.credits.min_credits_per_project, 0.5);
        assert_eq!(config.vegetation, VegetationConfig::default());
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "credits": { "provisional_credit_percentage": 0.9 } }"#).unwrap();

        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));

        let missing = PipelineConfig::from_json_file(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(AnalysisError::ConfigError { .. })));
    }

    #[test]
    fn test_apply_overrides() {
        let mut settings = CreditSettings::default();
        let overrides = json!({ "max_credits_per_hectare": 50.0, "bogus_key": 1 });

        let unknown = settings
            .apply_overrides(overrides.as_object().unwrap())
            .unwrap();

        assert_eq!(settings.max_credits_per_hectare, 50.0);
        assert_eq!(unknown, vec!["bogus_key".to_string()]);
    }

    #[test]
    fn test_apply_overrides_rejects_invalid_value() {
        let mut settings = CreditSettings::default();
        let overrides = json!({ "provisional_credit_percentage": 0.75 });

        assert!(settings.apply_overrides(overrides.as_object().unwrap()).is_err());
        assert_eq!(settings.provisional_credit_percentage, 0.5);
    }
}
