//! Colour-distribution check for foliage and fur backgrounds.

use crate::buffer::PixelBuffer;
use crate::skin;
use crate::thresholds::{AnimalLimits, SkinColorBands};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorDistribution {
    pub green_pct: f32,
    pub brown_gray_pct: f32,
}

impl ColorDistribution {
    pub fn looks_like_animal(&self, limits: &AnimalLimits) -> bool {
        self.green_pct > limits.green_pct || self.brown_gray_pct > limits.brown_gray_pct
    }
}

fn is_green_dominant(r: u8, g: u8, b: u8, margin: u8) -> bool {
    g as i16 - r as i16 > margin as i16 && g as i16 - b as i16 > margin as i16
}

fn is_brown_gray(r: u8, g: u8, b: u8, limits: &AnimalLimits) -> bool {
    let tol = limits.brown_gray_tolerance;
    limits.brown_gray_red.contains(r)
        && r.abs_diff(g) <= tol
        && g.abs_diff(b) <= tol
        && r.abs_diff(b) <= tol
}

/// Share of green-dominant and brown/gray pixels among visible pixels.
///
/// Pixels accepted by the skin rule are never counted as brown/gray, so an
/// image that is mostly skin cannot trip the fur check.
pub fn color_distribution(
    buffer: &PixelBuffer,
    bands: &SkinColorBands,
    limits: &AnimalLimits,
) -> ColorDistribution {
    let mut visible = 0usize;
    let mut green = 0usize;
    let mut brown_gray = 0usize;

    for [r, g, b, a] in buffer.pixels() {
        if a < bands.min_alpha {
            continue;
        }
        visible += 1;
        if is_green_dominant(r, g, b, limits.green_margin) {
            green += 1;
        } else if is_brown_gray(r, g, b, limits) && !skin::is_skin_pixel(r, g, b, bands) {
            brown_gray += 1;
        }
    }

    if visible == 0 {
        return ColorDistribution {
            green_pct: 0.0,
            brown_gray_pct: 0.0,
        };
    }
    let total = visible as f32;
    ColorDistribution {
        green_pct: green as f32 / total * 100.0,
        brown_gray_pct: brown_gray as f32 / total * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn two_tone(top: [u8; 3], bottom: [u8; 3], top_rows: u32) -> PixelBuffer {
        let img = RgbaImage::from_fn(20, 20, |_, y| {
            let [r, g, b] = if y < top_rows { top } else { bottom };
            Rgba([r, g, b, 255])
        });
        PixelBuffer::from_rgba(img).unwrap()
    }

    #[test]
    fn test_foliage_flags_green() {
        let (bands, limits) = (SkinColorBands::default(), AnimalLimits::default());
        let dist = color_distribution(&two_tone([60, 150, 50], [150, 110, 90], 8), &bands, &limits);
        assert!((dist.green_pct - 40.0).abs() < 1e-3);
        assert!(dist.looks_like_animal(&limits));
    }

    #[test]
    fn test_brown_gray_needs_higher_share() {
        let (bands, limits) = (SkinColorBands::default(), AnimalLimits::default());
        let img = two_tone([120, 115, 110], [150, 110, 90], 10);
        let half = color_distribution(&img, &bands, &limits);
        assert!((half.brown_gray_pct - 50.0).abs() < 1e-3);
        assert!(!half.looks_like_animal(&limits));

        let img = two_tone([120, 115, 110], [150, 110, 90], 14);
        let most = color_distribution(&img, &bands, &limits);
        assert!(most.looks_like_animal(&limits));
    }

    #[test]
    fn test_skin_is_not_animal() {
        let (bands, limits) = (SkinColorBands::default(), AnimalLimits::default());
        let img = two_tone([150, 110, 90], [150, 110, 90], 0);
        let dist = color_distribution(&img, &bands, &limits);
        assert_eq!(dist.green_pct, 0.0);
        assert_eq!(dist.brown_gray_pct, 0.0);
    }

    #[test]
    fn test_skin_boundary_pixel_is_not_brown_gray() {
        // red leads green by exactly the skin gap and the brown/gray tolerance
        let (bands, limits) = (SkinColorBands::default(), AnimalLimits::default());
        let (r, g, b) = (120, 105, 105);
        assert!(skin::is_skin_pixel(r, g, b, &bands));
        assert!(is_brown_gray(r, g, b, &limits));

        let dist = color_distribution(&two_tone([r, g, b], [r, g, b], 0), &bands, &limits);
        assert_eq!(dist.brown_gray_pct, 0.0);
        assert!(!dist.looks_like_animal(&limits));
    }
}
