//! Image analysis and before/after comparison

pub mod analyzer;
pub mod greenness;
pub mod health;
pub mod temporal;
pub mod transformation;

pub use analyzer::ImageAnalyzer;
pub use greenness::{GreenProgress, GreennessAnalyzer};
pub use health::{HealthScorer, ImageAnalysisResult};
pub use temporal::{TemporalAnalyzer, TemporalSummary};
pub use transformation::{
    TransformationAnalyzer, TransformationMetrics, TransformationQuality, TransformationType,
    VerificationLevel, VerificationScore,
};

use crate::error::AnalysisError;
use log::warn;
use serde::{Deserialize, Serialize};

/// A pipeline stage that failed and was replaced by neutral values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: String,
    pub reason: String,
}

impl Degradation {
    /// Record (and log) a recoverable failure of `stage`
    ///
    /// `context` describes the stage inputs so the failure can be reproduced.
    pub fn record(stage: &str, error: &AnalysisError, context: &str) -> Self {
        warn!("Stage '{}' degraded to neutral defaults ({}): {}", stage, context, error);
        Self {
            stage: stage.to_string(),
            reason: error.to_string(),
        }
    }
}
