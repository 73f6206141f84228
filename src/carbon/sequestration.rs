//! CO2 sequestration estimation
//!
//! The primary driver is the image-derived greenery change: how much the
//! vegetation coverage grew between the two photographs, blended with the
//! NDVI delta and mapped onto a stepped multiplier in `[0, 1.5]`. The
//! transformation-type multiplier is kept as a secondary, half-weighted factor.
//!
//! ```text
//! soil    = soil_rate    * tm * gm       * area_factor * effective_area * years
//! biomass = biomass_rate * tm * gm * 1.2 * area_factor * effective_area * years
//! co2     = (soil + biomass) * confidence_factor
//! ```

use crate::analysis::health::ImageAnalysisResult;
use crate::analysis::transformation::{TransformationMetrics, TransformationType};
use crate::carbon::ecosystem::EcosystemType;
use crate::config::SequestrationConfig;
use crate::constants::{confidence, credits};
use crate::error::{AnalysisError, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Bounds of the confidence factor derived from image confidence
const MIN_CONFIDENCE_FACTOR: f64 = 0.6;
const MAX_CONFIDENCE_FACTOR: f64 = 1.0;

/// Confidence factor assumed when the CO2 stage had to be replaced
const NEUTRAL_CONFIDENCE_FACTOR: f64 = 0.8;

/// Clamp applied to the caller-supplied factor of the image-free estimate
const MIN_TRANSFORMATION_FACTOR: f64 = 0.5;
const MAX_TRANSFORMATION_FACTOR: f64 = 1.5;

/// Greenery change (%) upper bounds and their multipliers, ascending
///
/// Changes at or below 0 map to 0; changes above the last bound map to 1.5.
const GREENERY_LADDER: [(f64, f64); 7] = [
    (0.0, 0.0),
    (10.0, 0.05),
    (20.0, 0.2),
    (35.0, 0.5),
    (50.0, 0.8),
    (75.0, 1.1),
    (100.0, 1.3),
];
const MAX_GREENERY_MULTIPLIER: f64 = 1.5;

/// CO2 estimate with every factor that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2Result {
    /// Always >= 0
    pub co2_sequestration_kg: f64,
    pub co2_sequestration_tonnes: f64,
    pub soil_co2_kg: f64,
    pub biomass_co2_kg: f64,
    /// Same area and period at the ecosystem's standard restoration rate
    pub standard_rate_co2_kg: f64,

    pub greenery_change_percentage: f64,
    /// 0.0 to 1.5
    pub greenery_multiplier: f64,

    pub ecosystem_type: EcosystemType,
    pub soil_rate_kg_ha_year: f64,
    pub biomass_rate_kg_ha_year: f64,
    pub standard_rate_kg_ha_year: f64,

    /// Transformation-type multiplier after down-weighting
    pub transformation_multiplier: f64,
    pub area_factor: f64,
    /// 0.6 to 1.0
    pub confidence_factor: f64,
    pub area_fraction_transformed: f64,
    pub effective_area_hectares: f64,
    pub project_area_hectares: f64,
    pub time_period_years: f64,
}

impl Co2Result {
    /// Stand-in for a failed CO2 stage: no sequestration claimed
    pub fn neutral(project_area_hectares: f64, time_period_years: f64, area_fraction: f64) -> Self {
        let ecosystem = EcosystemType::DegradedRecovery;
        Self {
            co2_sequestration_kg: 0.0,
            co2_sequestration_tonnes: 0.0,
            soil_co2_kg: 0.0,
            biomass_co2_kg: 0.0,
            standard_rate_co2_kg: 0.0,
            greenery_change_percentage: 0.0,
            greenery_multiplier: 0.0,
            ecosystem_type: ecosystem,
            soil_rate_kg_ha_year: ecosystem.soil_rate(),
            biomass_rate_kg_ha_year: ecosystem.biomass_rate(),
            standard_rate_kg_ha_year: ecosystem.standard_rate(),
            transformation_multiplier: 0.0,
            area_factor: area_factor(project_area_hectares),
            confidence_factor: NEUTRAL_CONFIDENCE_FACTOR,
            area_fraction_transformed: area_fraction,
            effective_area_hectares: project_area_hectares * area_fraction,
            project_area_hectares,
            time_period_years,
        }
    }
}

/// CO2 converted to credits at a fixed rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonCredits {
    pub carbon_credits: f64,
    pub co2_tonnes: f64,
    pub credit_conversion_rate: f64,
}

/// Map a greenery change percentage to its multiplier
///
/// Monotonic non-decreasing, within `[0, 1.5]`. Non-finite input maps to 0
/// except positive infinity, which is treated as the largest change.
pub fn greenery_multiplier(change_percentage: f64) -> f64 {
    if change_percentage.is_nan() {
        return 0.0;
    }
    GREENERY_LADDER
        .iter()
        .find(|(bound, _)| change_percentage <= *bound)
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(MAX_GREENERY_MULTIPLIER)
}

/// Secondary multiplier for each transformation type (before down-weighting)
pub fn transformation_multiplier(transformation: TransformationType) -> f64 {
    match transformation {
        TransformationType::BarrenToDenseVegetation => 1.8,
        TransformationType::BarrenToModerateVegetation => 1.4,
        TransformationType::SparseToDenseVegetation => 1.3,
        TransformationType::ModerateToDenseVegetation => 1.1,
        TransformationType::MaintainedVegetation => 1.0,
        TransformationType::VegetationDegradation => 0.2,
        TransformationType::NoSignificantChange => 0.6,
    }
}

/// Step function of project size
pub fn area_factor(hectares: f64) -> f64 {
    if !(hectares > 0.0) {
        0.0
    } else if hectares < 1.0 {
        0.8
    } else if hectares <= 10.0 {
        1.0
    } else if hectares <= 50.0 {
        1.1
    } else if hectares <= 100.0 {
        1.05
    } else {
        1.0
    }
}

/// Confidence factor in `[0.6, 1.0]` from the mean image confidence
pub fn confidence_factor(before: &ImageAnalysisResult, after: &ImageAnalysisResult) -> f64 {
    let mean = (before.verification.confidence_score + after.verification.confidence_score) / 2.0;
    let mean = if mean.is_finite() { mean } else { confidence::NEUTRAL_SCORE };
    (MIN_CONFIDENCE_FACTOR + mean / 100.0 * 0.4).clamp(MIN_CONFIDENCE_FACTOR, MAX_CONFIDENCE_FACTOR)
}

/// Convert CO2 mass to credits: tonnes divided by the conversion rate
pub fn carbon_credits(co2_kg: f64, conversion_rate: f64) -> Result<CarbonCredits> {
    if !(conversion_rate > 0.0) {
        return Err(AnalysisError::invalid_parameter("credit_conversion_rate", conversion_rate));
    }
    let co2_tonnes = co2_kg.max(0.0) / 1000.0;
    Ok(CarbonCredits {
        carbon_credits: co2_tonnes / conversion_rate,
        co2_tonnes,
        credit_conversion_rate: conversion_rate,
    })
}

/// Default conversion used for the audit figure in supporting analysis
pub fn default_carbon_credits(co2_kg: f64) -> CarbonCredits {
    let co2_tonnes = co2_kg.max(0.0) / 1000.0;
    CarbonCredits {
        carbon_credits: co2_tonnes / credits::BASELINE_CREDIT_RATE,
        co2_tonnes,
        credit_conversion_rate: credits::BASELINE_CREDIT_RATE,
    }
}

pub(crate) fn check_positive(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid_parameter(parameter, value))
    }
}

/// CO2 sequestration calculator
pub struct Co2Calculator {
    config: SequestrationConfig,
}

impl Default for Co2Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Co2Calculator {
    pub fn new() -> Self {
        Self::with_config(SequestrationConfig::default())
    }

    pub fn with_config(config: SequestrationConfig) -> Self {
        Self { config }
    }

    /// Greenery change (%) between two analyses
    ///
    /// Relative coverage change (or twice the new coverage when the before
    /// image had none) blended with the NDVI delta, then damped for barren
    /// and low-vegetation pairs and clamped.
    pub fn greenery_change(&self, before: &ImageAnalysisResult, after: &ImageAnalysisResult) -> f64 {
        let cfg = &self.config;
        let before_coverage = before.vegetation.total_coverage;
        let after_coverage = after.vegetation.total_coverage;

        let coverage_change = if before_coverage == 0.0 {
            if after_coverage > 0.0 {
                after_coverage * 2.0
            } else {
                0.0
            }
        } else {
            (after_coverage - before_coverage) / before_coverage * 100.0
        };
        let ndvi_change = (after.ndvi.mean - before.ndvi.mean) * 100.0;

        let mut combined = coverage_change * cfg.coverage_weight + ndvi_change * cfg.ndvi_weight;

        if before_coverage < cfg.barren_coverage_threshold && after_coverage < cfg.barren_coverage_threshold {
            // Barren to barren: differences are image noise unless clearly larger
            combined = if after_coverage <= before_coverage * cfg.barren_relative_gain {
                0.0
            } else {
                combined.clamp(0.0, cfg.barren_marginal_cap)
            };
        } else if before_coverage < cfg.low_coverage_threshold
            && after_coverage < cfg.low_coverage_threshold
        {
            combined = combined.clamp(0.0, cfg.low_coverage_cap);
        }

        let change = combined.clamp(cfg.min_greenery_change, cfg.max_greenery_change);
        debug!(
            "Greenery change: coverage {:.1}% -> {:.1}%, change {:.1}%",
            before_coverage, after_coverage, change
        );
        change
    }

    /// Estimate CO2 sequestration from a before/after pair
    ///
    /// # Arguments
    ///
    /// * `before`, `after` - Analysed images; the ecosystem is inferred from `after`
    /// * `metrics` - Transformation metrics for the pair
    /// * `project_area_hectares` - Project area, > 0
    /// * `time_period_years` - Period, > 0
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` for a non-positive area or
    /// period, and `AnalysisError::ComputationError` if the estimate is not a
    /// finite, non-negative number.
    pub fn calculate(
        &self,
        before: &ImageAnalysisResult,
        after: &ImageAnalysisResult,
        metrics: &TransformationMetrics,
        project_area_hectares: f64,
        time_period_years: f64,
    ) -> Result<Co2Result> {
        check_positive("project_area_hectares", project_area_hectares)?;
        check_positive("time_period_years", time_period_years)?;

        let greenery_change = self.greenery_change(before, after);
        let greenery = greenery_multiplier(greenery_change);

        let ecosystem = EcosystemType::infer(after);
        let soil_rate = ecosystem.soil_rate();
        let biomass_rate = ecosystem.biomass_rate();
        let standard_rate = ecosystem.standard_rate();

        let transformation = transformation_multiplier(metrics.transformation_type)
            * self.config.transformation_weight;
        let area = area_factor(project_area_hectares);
        let fraction = self.config.area_fraction_transformed;
        let effective_area = project_area_hectares * fraction;
        let scale = transformation * greenery * area * effective_area * time_period_years;

        let soil = soil_rate * scale;
        let biomass = biomass_rate * self.config.biomass_weight * scale;
        let confidence = confidence_factor(before, after);
        let co2 = (soil + biomass) * confidence;

        if !co2.is_finite() || co2 < 0.0 {
            return Err(AnalysisError::computation(
                "co2_sequestration",
                format!("invalid CO2 estimate {} for {} ha over {} years", co2, project_area_hectares, time_period_years),
            ));
        }

        debug!(
            "CO2: {} at {:.0}+{:.0} kg/ha/yr, tm {:.2}, gm {:.2}, af {:.2}, cf {:.3} -> {:.1} kg",
            ecosystem, soil_rate, biomass_rate, transformation, greenery, area, confidence, co2
        );

        Ok(Co2Result {
            co2_sequestration_kg: co2,
            co2_sequestration_tonnes: co2 / 1000.0,
            soil_co2_kg: soil * confidence,
            biomass_co2_kg: biomass * confidence,
            standard_rate_co2_kg: standard_rate * effective_area * time_period_years,
            greenery_change_percentage: greenery_change,
            greenery_multiplier: greenery,
            ecosystem_type: ecosystem,
            soil_rate_kg_ha_year: soil_rate,
            biomass_rate_kg_ha_year: biomass_rate,
            standard_rate_kg_ha_year: standard_rate,
            transformation_multiplier: transformation,
            area_factor: area,
            confidence_factor: confidence,
            area_fraction_transformed: fraction,
            effective_area_hectares: effective_area,
            project_area_hectares,
            time_period_years,
        })
    }

    /// Image-free estimate at the ecosystem's standard restoration rate
    ///
    /// # Arguments
    ///
    /// * `ecosystem` - Declared ecosystem
    /// * `area_hectares` - Project area, > 0
    /// * `time_period_years` - Period, > 0
    /// * `transformation_factor` - Expected impact, clamped to `[0.5, 1.5]`
    ///
    /// # Returns
    ///
    /// CO2 in kg, never negative
    pub fn basic_sequestration(
        &self,
        ecosystem: EcosystemType,
        area_hectares: f64,
        time_period_years: f64,
        transformation_factor: f64,
    ) -> Result<f64> {
        check_positive("area_hectares", area_hectares)?;
        check_positive("time_period_years", time_period_years)?;
        if !transformation_factor.is_finite() {
            return Err(AnalysisError::invalid_parameter("transformation_factor", transformation_factor));
        }

        let factor = transformation_factor.clamp(MIN_TRANSFORMATION_FACTOR, MAX_TRANSFORMATION_FACTOR);
        let effective_area = area_hectares * self.config.area_fraction_transformed;
        let co2 = ecosystem.standard_rate()
            * factor
            * area_factor(area_hectares)
            * effective_area
            * time_period_years;

        Ok(co2.max(0.0))
    }
}
