//! Vegetation and land-composition detection module
//!
//! This module handles the per-pixel classification of a single image:
//! vegetation masks with an NDVI-like field, and the auxiliary soil/water
//! and texture measurements.

pub mod composition;
pub mod vegetation;

pub use composition::{CompositionAnalyzer, CompositionResult};
pub use vegetation::{VegetationDetection, VegetationDetector};
