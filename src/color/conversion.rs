//! Color space conversion utilities
//!
//! Provides the per-pixel conversions used by the vegetation heuristics:
//! - RGB to 8-bit HSV (hue halved into `[0, 180)`, S/V in `[0, 255]`)
//! - RGB to CIE Lab (D65) and its 8-bit encoding (`a* + 128`)
//! - RGB to luma for texture measurements
//!
//! The 8-bit encodings match the conventions of common imaging libraries so
//! that thresholds expressed in those units carry over unchanged.

use palette::{FromColor, Lab, Srgb};

/// Pixel in 8-bit HSV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv8 {
    /// Hue in half-degrees, `[0, 180)`
    pub hue: u8,
    /// Saturation, `[0, 255]`
    pub saturation: u8,
    /// Value (brightness), `[0, 255]`
    pub value: u8,
}

impl Hsv8 {
    /// Inclusive hue window with exclusive saturation/value floors
    #[inline]
    pub fn in_window(&self, hue_min: u8, hue_max: u8, min_saturation: u8, min_value: u8) -> bool {
        self.hue >= hue_min
            && self.hue <= hue_max
            && self.saturation > min_saturation
            && self.value > min_value
    }
}

/// Color converter for pixel classification
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    /// Create a new color converter
    pub fn new() -> Self {
        Self
    }

    /// Convert RGB (0-255) to 8-bit HSV
    ///
    /// # Arguments
    ///
    /// * `r`, `g`, `b` - RGB values in range [0, 255]
    ///
    /// # Returns
    ///
    /// HSV with hue in half-degrees. Achromatic pixels get hue 0.
    pub fn rgb_to_hsv8(&self, r: u8, g: u8, b: u8) -> Hsv8 {
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let delta = max - min;

        let saturation = if max > 0.0 {
            (delta * 255.0 / max).round()
        } else {
            0.0
        };

        let hue_degrees = if delta == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / delta
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        let hue_degrees = if hue_degrees < 0.0 {
            hue_degrees + 360.0
        } else {
            hue_degrees
        };
        let hue = ((hue_degrees / 2.0).round() as u16 % 180) as u8;

        Hsv8 {
            hue,
            saturation: saturation.clamp(0.0, 255.0) as u8,
            value: max as u8,
        }
    }

    /// Convert RGB (0-255) to Lab color space (D65)
    pub fn rgb_to_lab(&self, r: u8, g: u8, b: u8) -> Lab {
        let srgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        Lab::from_color(srgb)
    }

    /// 8-bit encoded a* channel (`a* + 128`, rounded and saturated)
    ///
    /// Values below 128 lean green, values above lean red.
    pub fn lab_a8(&self, r: u8, g: u8, b: u8) -> u8 {
        let lab = self.rgb_to_lab(r, g, b);
        (lab.a + 128.0).round().clamp(0.0, 255.0) as u8
    }

    /// Luma (ITU-R BT.601 weights) in range [0, 255]
    #[inline]
    pub fn luma(&self, r: u8, g: u8, b: u8) -> f64 {
        0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_primary_colors() {
        let converter = ColorConverter::new();

        let red = converter.rgb_to_hsv8(255, 0, 0);
        assert_eq!(red, Hsv8 { hue: 0, saturation: 255, value: 255 });

        let green = converter.rgb_to_hsv8(0, 255, 0);
        assert_eq!(green.hue, 60);

        let blue = converter.rgb_to_hsv8(0, 0, 255);
        assert_eq!(blue.hue, 120);
    }

    #[test]
    fn test_hsv_achromatic() {
        let converter = ColorConverter::new();

        let black = converter.rgb_to_hsv8(0, 0, 0);
        assert_eq!(black, Hsv8 { hue: 0, saturation: 0, value: 0 });

        let gray = converter.rgb_to_hsv8(128, 128, 128);
        assert_eq!(gray.saturation, 0);
        assert_eq!(gray.value, 128);
    }

    #[test]
    fn test_hsv_earth_tones() {
        let converter = ColorConverter::new();

        // Brown soil: hue 30 degrees -> 15
        let brown = converter.rgb_to_hsv8(150, 100, 50);
        assert_eq!(brown.hue, 15);
        assert_eq!(brown.saturation, 170);

        // Sea blue: hue ~213 degrees -> ~107
        let water = converter.rgb_to_hsv8(30, 100, 200);
        assert!((100..=130).contains(&water.hue));
    }

    #[test]
    fn test_hsv_window() {
        let forest = ColorConverter::new().rgb_to_hsv8(34, 139, 34);
        assert!(forest.in_window(35, 85, 30, 20));
        assert!(!forest.in_window(10, 30, 20, 0));
    }

    #[test]
    fn test_lab_white_is_neutral() {
        let converter = ColorConverter::new();
        let lab = converter.rgb_to_lab(255, 255, 255);
        assert!(lab.l > 99.0);
        assert!(lab.a.abs() < 1.0);
        assert_eq!(converter.lab_a8(255, 255, 255), 128);
    }

    #[test]
    fn test_lab_a_channel_direction() {
        let converter = ColorConverter::new();
        assert!(converter.lab_a8(34, 139, 34) < 127);
        assert!(converter.lab_a8(150, 100, 50) > 128);
        assert_eq!(converter.lab_a8(0, 0, 0), 128);
    }

    #[test]
    fn test_luma() {
        let converter = ColorConverter::new();
        assert!((converter.luma(255, 255, 255) - 255.0).abs() < 1e-9);
        assert_eq!(converter.luma(0, 0, 0), 0.0);
    }
}
