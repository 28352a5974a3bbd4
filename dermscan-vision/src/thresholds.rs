//! Tuned constants for every heuristic in the classifier.
//!
//! The defaults were picked by trial and error on phone photos rather than
//! fitted to a labelled dataset, so treat them as starting points. Each group
//! deserializes with `#[serde(default)]`, which lets a config file override a
//! single value without restating the rest.

use serde::{Deserialize, Serialize};

/// Inclusive numeric band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Band<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Images narrower or shorter than this are rejected outright.
    pub min_dimension: u32,
    pub skin: SkinColorBands,
    pub texture: TextureLimits,
    pub basic: BasicDecision,
    pub animal: AnimalLimits,
    pub face: FaceLimits,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_dimension: 100,
            skin: SkinColorBands::default(),
            texture: TextureLimits::default(),
            basic: BasicDecision::default(),
            animal: AnimalLimits::default(),
            face: FaceLimits::default(),
        }
    }
}

/// Per-pixel YCbCr + RGB skin rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinColorBands {
    /// Pixels with a lower alpha are ignored by every pixel scan.
    pub min_alpha: u8,
    pub luma: Band<f32>,
    pub cb: Band<f32>,
    pub cr: Band<f32>,
    pub min_red_green_gap: u8,
    pub red_green_ratio: Band<f32>,
    pub red_blue_ratio: Band<f32>,
}

impl Default for SkinColorBands {
    fn default() -> Self {
        Self {
            min_alpha: 128,
            luma: Band::new(40.0, 240.0),
            cb: Band::new(77.0, 127.0),
            cr: Band::new(133.0, 173.0),
            min_red_green_gap: 15,
            red_green_ratio: Band::new(1.05, 2.5),
            red_blue_ratio: Band::new(1.05, 3.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureLimits {
    /// Grid step for the gradient pass, in pixels.
    pub sample_stride: u32,
    /// Sobel magnitude (on 0..=255 luma) above which a sample counts as an edge.
    pub edge_magnitude: f32,
    /// Neighbour luma difference counted as a texture jump.
    pub luma_jump: f32,
    pub base_edge_ceiling: f32,
    pub lenient_edge_ceiling: f32,
    pub lenient_below_skin_pct: f32,
    pub strict_edge_ceiling: f32,
    pub strict_above_skin_pct: f32,
    pub max_texture_variance: f32,
}

impl Default for TextureLimits {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            edge_magnitude: 100.0,
            luma_jump: 25.0,
            base_edge_ceiling: 0.25,
            lenient_edge_ceiling: 0.50,
            lenient_below_skin_pct: 20.0,
            strict_edge_ceiling: 0.20,
            strict_above_skin_pct: 40.0,
            max_texture_variance: 45.0,
        }
    }
}

impl TextureLimits {
    /// Edge-density ceiling for an image with the given skin percentage.
    ///
    /// Little skin tone earns a looser structural check; lots of skin tone
    /// must also look smooth, which is what separates skin from tan fur.
    pub fn edge_ceiling(&self, skin_pct: f32) -> f32 {
        if skin_pct < self.lenient_below_skin_pct {
            self.lenient_edge_ceiling
        } else if skin_pct > self.strict_above_skin_pct {
            self.strict_edge_ceiling
        } else {
            self.base_edge_ceiling
        }
    }
}

/// Percentages driving the colour/texture verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicDecision {
    /// Above this skin percentage colour evidence wins over texture evidence.
    pub color_override_pct: f32,
    pub accept_skin_pct: f32,
    /// Between this and `accept_skin_pct` the image passes with a warning.
    pub warn_skin_pct: f32,
}

impl Default for BasicDecision {
    fn default() -> Self {
        Self {
            color_override_pct: 50.0,
            accept_skin_pct: 20.0,
            warn_skin_pct: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimalLimits {
    pub green_margin: u8,
    pub green_pct: f32,
    pub brown_gray_red: Band<u8>,
    /// Largest channel spread still counted as brown/gray.
    pub brown_gray_tolerance: u8,
    pub brown_gray_pct: f32,
}

impl Default for AnimalLimits {
    fn default() -> Self {
        Self {
            green_margin: 20,
            green_pct: 30.0,
            brown_gray_red: Band::new(50, 200),
            brown_gray_tolerance: 15,
            brown_gray_pct: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceLimits {
    /// Bounding box width / height band for a frontal human face.
    pub aspect_ratio: Band<f32>,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for FaceLimits {
    fn default() -> Self {
        Self {
            aspect_ratio: Band::new(0.5, 0.9),
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}
