//! Multi-frame aggregation
//!
//! Aggregates analyses of a sequence of frames from the same site (for example
//! stills extracted from a survey video by the caller) into averages, a
//! stability measure and least-squares trends.

use crate::analysis::analyzer::ImageAnalyzer;
use crate::analysis::health::ImageAnalysisResult;
use crate::detection::composition::variance;
use crate::error::{AnalysisError, Result};
use image::RgbImage;
use log::info;
use serde::{Deserialize, Serialize};

/// Slope (units per frame) beyond which a series is trending
const TREND_SLOPE_THRESHOLD: f64 = 1.0;

/// Number of frame summaries carried into the aggregate
const MAX_FRAME_SUMMARIES: usize = 3;

/// Direction of a per-frame series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl Trend {
    /// Classify a series by its least-squares slope against frame index
    pub fn of(values: &[f64]) -> Self {
        if values.len() < 2 {
            return Trend::InsufficientData;
        }

        let n = values.len() as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / n;
        let (mut covariance, mut spread) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            covariance += dx * (y - mean_y);
            spread += dx * dx;
        }
        let slope = covariance / spread;

        if slope > TREND_SLOPE_THRESHOLD {
            Trend::Increasing
        } else if slope < -TREND_SLOPE_THRESHOLD {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

/// Aggregate of several frame analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSummary {
    pub label: String,
    pub frames_analyzed: usize,
    pub average_ndvi: f64,
    pub average_vegetation_coverage: f64,
    pub average_health_index: f64,
    /// Standard deviation of coverage across frames
    pub vegetation_stability: f64,
    pub vegetation_trend: Trend,
    pub health_trend: Trend,
    /// Mangrove indicator set in more than half of the frames
    pub consistent_mangrove_detection: bool,
    pub temporal_confidence: f64,
    pub frame_summaries: Vec<String>,
}

/// Frame-sequence analyzer
#[derive(Default)]
pub struct TemporalAnalyzer {
    analyzer: ImageAnalyzer,
}

impl TemporalAnalyzer {
    pub fn new() -> Self {
        Self::with_analyzer(ImageAnalyzer::new())
    }

    pub fn with_analyzer(analyzer: ImageAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Analyse each frame and aggregate the results
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` if `frames` is empty.
    pub fn analyze_frames(&self, label: &str, frames: &[RgbImage]) -> Result<TemporalSummary> {
        let analyses: Vec<ImageAnalysisResult> = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| self.analyzer.analyze(frame, &format!("{}_frame_{}", label, i)))
            .collect();

        self.aggregate(label, &analyses)
    }

    /// Aggregate existing frame analyses
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidParameter` if `analyses` is empty.
    pub fn aggregate(&self, label: &str, analyses: &[ImageAnalysisResult]) -> Result<TemporalSummary> {
        if analyses.is_empty() {
            return Err(AnalysisError::invalid_parameter("frames", "empty sequence"));
        }

        let n = analyses.len() as f64;
        let coverages: Vec<f64> = analyses.iter().map(|a| a.vegetation.total_coverage).collect();
        let health: Vec<f64> = analyses.iter().map(|a| a.detection.health_index).collect();
        let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;

        let mangrove_frames = analyses.iter().filter(|a| a.detection.mangrove_detected).count();

        let summary = TemporalSummary {
            label: label.to_string(),
            frames_analyzed: analyses.len(),
            average_ndvi: analyses.iter().map(|a| a.ndvi.mean).sum::<f64>() / n,
            average_vegetation_coverage: mean(&coverages),
            average_health_index: mean(&health),
            vegetation_stability: variance(&coverages).sqrt(),
            vegetation_trend: Trend::of(&coverages),
            health_trend: Trend::of(&health),
            consistent_mangrove_detection: mangrove_frames as f64 / n > 0.5,
            temporal_confidence: analyses
                .iter()
                .map(|a| a.verification.confidence_score)
                .sum::<f64>()
                / n,
            frame_summaries: analyses
                .iter()
                .take(MAX_FRAME_SUMMARIES)
                .map(|a| a.summary.clone())
                .collect(),
        };

        info!(
            "Aggregated {} frames of {}: coverage {:.1}% ({:?})",
            summary.frames_analyzed, label, summary.average_vegetation_coverage, summary.vegetation_trend
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const FOREST: Rgb<u8> = Rgb([34, 139, 34]);
    const SOIL: Rgb<u8> = Rgb([150, 100, 50]);

    fn frame(green_rows: u32) -> RgbImage {
        RgbImage::from_fn(10, 10, |_, y| if y < green_rows { FOREST } else { SOIL })
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(Trend::of(&[]), Trend::InsufficientData);
        assert_eq!(Trend::of(&[5.0]), Trend::InsufficientData);
        assert_eq!(Trend::of(&[10.0, 20.0, 30.0]), Trend::Increasing);
        assert_eq!(Trend::of(&[30.0, 20.0, 10.0]), Trend::Decreasing);
        assert_eq!(Trend::of(&[10.0, 10.5, 11.0]), Trend::Stable);
    }

    #[test]
    fn test_growing_site() {
        let frames = vec![frame(2), frame(5), frame(8), frame(10)];
        let summary = TemporalAnalyzer::new().analyze_frames("survey", &frames).unwrap();

        assert_eq!(summary.frames_analyzed, 4);
        assert!((summary.average_vegetation_coverage - 62.5).abs() < 1e-9);
        assert_eq!(summary.vegetation_trend, Trend::Increasing);
        assert!(summary.vegetation_stability > 0.0);
        assert_eq!(summary.frame_summaries.len(), 3);
        assert!(summary.consistent_mangrove_detection);
    }

    #[test]
    fn test_single_frame() {
        let summary = TemporalAnalyzer::new().analyze_frames("still", &[frame(0)]).unwrap();

        assert_eq!(summary.vegetation_trend, Trend::InsufficientData);
        assert_eq!(summary.vegetation_stability, 0.0);
        assert!(!summary.consistent_mangrove_detection);
        assert_eq!(summary.temporal_confidence, 60.0);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert!(TemporalAnalyzer::new().analyze_frames("none", &[]).is_err());
    }
}
