//! # Blue Carbon Credits
//!
//! A Rust crate for estimating carbon credits of blue-carbon restoration
//! projects from a pair of before/after site photographs.
//!
//! This library provides the vegetation-change-to-credit pipeline:
//! - Detecting vegetation with HSV, Lab and RGB-derived NDVI heuristics
//! - Scoring vegetation health and per-image confidence
//! - Classifying and scoring the before/after transformation
//! - Estimating CO2 sequestration from the observed greenery change
//! - Converting CO2 into credits split into provisional and deferred amounts
//!
//! The library performs no file or network I/O: images are passed in as
//! bytes already read by the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use blue_carbon_credits::calculate_dynamic_credits;
//!
//! let before = std::fs::read("before.jpg").unwrap();
//! let after = std::fs::read("after.jpg").unwrap();
//! let result = calculate_dynamic_credits(&before, &after, 5.0, 2.0, None)?;
//! println!("{:.2} credits, {:.2} released now", result.recommended_credits, result.provisional_credits);
//! # Ok::<(), blue_carbon_credits::AnalysisError>(())
//! ```

pub mod analysis;
pub mod carbon;
pub mod color;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod image_loader;

pub use analysis::{
    Degradation, GreenProgress, GreennessAnalyzer, ImageAnalysisResult, ImageAnalyzer,
    TemporalAnalyzer, TemporalSummary, TransformationAnalyzer, TransformationMetrics,
    TransformationQuality, TransformationType, VerificationLevel, VerificationScore,
};
pub use carbon::{
    calculate_dynamic_credits, legacy_credits, Co2Calculator, Co2Result, CreditCalculationResult,
    CreditCalculator, CreditDistribution, DynamicCreditCalculator, EcosystemType,
    ProjectMetadata, SupportingAnalysis,
};
pub use config::PipelineConfig;
pub use error::{AnalysisError, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_serialization() {
        let err = AnalysisError::computation("credit_distribution", "total is NaN");
        let result = CreditCalculationResult::from_error(&err, 3.0, 1.0);

        let json = serde_json::to_string(&result).unwrap();
        let deserialized: CreditCalculationResult = serde_json::from_str(&json).unwrap();

        assert_eq!(result, deserialized);
        assert!(json.contains("\"verification_level\":\"insufficient\""));
        assert!(!json.contains("supporting_analysis"));
    }
}
