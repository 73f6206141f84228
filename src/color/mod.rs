//! Color conversion module
//!
//! This module handles the per-pixel color space conversions that the
//! vegetation and composition heuristics are expressed in.

pub mod conversion;

pub use conversion::{ColorConverter, Hsv8};
