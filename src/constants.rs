//! Calibration constants and reference values for vegetation analysis
//!
//! This module contains compile-time defaults for the analysis pipeline.
//! Most of them seed [`crate::config::PipelineConfig`]; the rest are fixed
//! properties of the heuristics themselves.
//!
//! HSV values follow the 8-bit convention used by most imaging libraries:
//! hue in `[0, 180)` (degrees halved), saturation and value in `[0, 255]`.

/// Image preprocessing limits
pub mod processing {
    /// Images whose larger side exceeds this are downscaled before analysis
    pub const MAX_ANALYSIS_DIMENSION: u32 = 1024;

    /// Bounding box used when downscaling for analysis
    pub const ANALYSIS_RESIZE_WIDTH: u32 = 1024;
    pub const ANALYSIS_RESIZE_HEIGHT: u32 = 768;

    /// The green-progress analyzer works on smaller images
    pub const GREENNESS_MAX_DIMENSION: u32 = 512;
    pub const GREENNESS_RESIZE_WIDTH: u32 = 512;
    pub const GREENNESS_RESIZE_HEIGHT: u32 = 384;
}

/// Vegetation detection thresholds
pub mod vegetation {
    /// HSV hue window for green vegetation (8-bit hue units)
    pub const HUE_MIN: u8 = 35;
    pub const HUE_MAX: u8 = 85;

    /// Pixels must be strictly above these to count as vegetation
    pub const MIN_SATURATION: u8 = 30;
    pub const MIN_VALUE: u8 = 20;

    /// Neutral point of the 8-bit Lab a* channel; greener pixels fall below it
    pub const LAB_NEUTRAL_A: u8 = 127;

    /// Weight of the blue channel in the near-infrared proxy
    pub const NIR_BLUE_WEIGHT: f64 = 0.3;
}

/// NDVI health bands
pub mod ndvi {
    /// NDVI above this is healthy vegetation
    pub const HEALTHY_THRESHOLD: f64 = 0.4;

    /// NDVI above this (and at most healthy) is moderate vegetation
    pub const MODERATE_THRESHOLD: f64 = 0.2;

    /// Per-pixel NDVI above this counts toward mangrove likelihood
    pub const MANGROVE_PIXEL_THRESHOLD: f64 = 0.5;

    /// Mangrove likelihood (% of pixels) above which the indicator is set
    pub const MANGROVE_LIKELIHOOD_THRESHOLD: f64 = 15.0;

    /// Health index weights for healthy / moderate / sparse / bare pixels
    pub const HEALTH_WEIGHTS: [f64; 4] = [1.0, 0.7, 0.3, 0.0];
}

/// Composition masks (soil and water)
pub mod composition {
    /// Brown/tan soil hue window and minimum saturation
    pub const SOIL_HUE_MIN: u8 = 10;
    pub const SOIL_HUE_MAX: u8 = 30;
    pub const SOIL_MIN_SATURATION: u8 = 20;

    /// Blue water hue window and minimum saturation
    pub const WATER_HUE_MIN: u8 = 100;
    pub const WATER_HUE_MAX: u8 = 130;
    pub const WATER_MIN_SATURATION: u8 = 30;

    /// 9-tap second derivative: binomial smoothing of `[1, -2, 1]`
    pub const LAPLACIAN_DERIVATIVE_KERNEL: [f64; 9] =
        [1.0, 4.0, 4.0, -4.0, -10.0, -4.0, 4.0, 4.0, 1.0];

    /// 9-tap binomial smoothing applied across the derivative direction
    pub const LAPLACIAN_SMOOTHING_KERNEL: [f64; 9] =
        [1.0, 8.0, 28.0, 56.0, 70.0, 56.0, 28.0, 8.0, 1.0];
}

/// Per-image confidence scoring
pub mod confidence {
    /// Reported confidence never leaves this range
    pub const MIN_SCORE: f64 = 60.0;
    pub const MAX_SCORE: f64 = 95.0;

    /// Normalisers for the four confidence factors
    pub const COVERAGE_SCALE: f64 = 50.0;
    pub const HEALTH_SCALE: f64 = 80.0;
    pub const TEXTURE_SCALE: f64 = 100.0;

    /// Maximum penalty contributed by water coverage
    pub const MAX_WATER_PENALTY: f64 = 0.5;

    /// Confidence assumed for an image whose analysis had to be replaced
    pub const NEUTRAL_SCORE: f64 = 70.0;
}

/// Credit calculation defaults
pub mod credits {
    pub const MIN_CREDITS_PER_PROJECT: f64 = 0.5;
    pub const MAX_CREDITS_PER_HECTARE: f64 = 35.0;

    /// Credits per kg of CO2 (1 credit per 10 kg)
    pub const BASELINE_CREDIT_RATE: f64 = 0.1;

    pub const VERIFICATION_CONFIDENCE_THRESHOLD: f64 = 70.0;
    pub const HIGH_CONFIDENCE_BONUS_THRESHOLD: f64 = 90.0;

    /// Share of credits released immediately at the highest confidence tier
    pub const PROVISIONAL_CREDIT_PERCENTAGE: f64 = 0.5;

    /// Share released when the distribution stage itself fails
    pub const FALLBACK_PROVISIONAL_PERCENTAGE: f64 = 0.2;

    pub const PROVISIONAL_VERIFICATION_PERIOD_YEARS: u32 = 3;
    pub const STRICT_CONFIDENCE_THRESHOLD: f64 = 85.0;
    pub const MINIMUM_MONITORING_PERIOD_MONTHS: u32 = 12;

    /// Fixed award of the pre-analysis crediting scheme
    pub const LEGACY_FIXED_CREDITS: f64 = 100.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_ranges() {
        assert!(vegetation::HUE_MIN < vegetation::HUE_MAX);
        assert!(composition::SOIL_HUE_MAX < vegetation::HUE_MIN);
        assert!(vegetation::HUE_MAX < composition::WATER_HUE_MIN);
        assert!(ndvi::MODERATE_THRESHOLD < ndvi::HEALTHY_THRESHOLD);
        assert!(ndvi::HEALTHY_THRESHOLD < ndvi::MANGROVE_PIXEL_THRESHOLD);
        assert!(confidence::MIN_SCORE < confidence::MAX_SCORE);
    }

    #[test]
    fn test_credit_constants() {
        assert!(credits::PROVISIONAL_CREDIT_PERCENTAGE <= 0.5);
        assert!(credits::FALLBACK_PROVISIONAL_PERCENTAGE < credits::PROVISIONAL_CREDIT_PERCENTAGE);
        assert!(credits::MIN_CREDITS_PER_PROJECT < credits::MAX_CREDITS_PER_HECTARE);
    }

    #[test]
    fn test_processing_constraints() {
        assert!(processing::ANALYSIS_RESIZE_WIDTH <= processing::MAX_ANALYSIS_DIMENSION);
        assert!(processing::GREENNESS_MAX_DIMENSION < processing::MAX_ANALYSIS_DIMENSION);
    }
}
