//! Gradient-based texture statistics.
//!
//! Smooth skin produces few strong gradients; fur and feathers produce many.
//! Only every `sample_stride`-th interior pixel is visited.

use imageproc::filter::filter3x3;

use crate::buffer::GrayF32;
use crate::thresholds::TextureLimits;

const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextureStats {
    /// Fraction (0..=1) of sampled pixels whose Sobel magnitude is an edge.
    pub edge_density: f32,
    /// Percentage (0..=100) of sampled skin pixels next to a large luma jump.
    pub texture_variance: f32,
    pub samples: usize,
}

/// 3x3 Sobel magnitude for every pixel, row-major.
pub fn sobel_magnitudes(luma: &GrayF32) -> Vec<f32> {
    let gx: Vec<f32> = filter3x3(luma, &SOBEL_X).into_raw();
    let gy: Vec<f32> = filter3x3(luma, &SOBEL_Y).into_raw();
    gx.iter()
        .zip(&gy)
        .map(|(x, y)| (x * x + y * y).sqrt())
        .collect()
}

pub fn analyze(luma: &GrayF32, skin_mask: &[bool], limits: &TextureLimits) -> TextureStats {
    let (width, height) = (luma.width() as usize, luma.height() as usize);
    if width < 3 || height < 3 {
        return TextureStats::default();
    }
    let stride = limits.sample_stride.max(1) as usize;
    let magnitudes = sobel_magnitudes(luma);
    let plane = luma.as_raw();

    let mut samples = 0usize;
    let mut edges = 0usize;
    let mut skin_samples = 0usize;
    let mut jumps = 0usize;

    for y in (1..height - 1).step_by(stride) {
        for x in (1..width - 1).step_by(stride) {
            let idx = y * width + x;
            samples += 1;
            if magnitudes[idx] > limits.edge_magnitude {
                edges += 1;
            }

            if skin_mask.get(idx).copied().unwrap_or(false) {
                skin_samples += 1;
                let right = (plane[idx] - plane[idx + 1]).abs();
                let below = (plane[idx] - plane[idx + width]).abs();
                if right.max(below) > limits.luma_jump {
                    jumps += 1;
                }
            }
        }
    }

    TextureStats {
        edge_density: if samples == 0 {
            0.0
        } else {
            edges as f32 / samples as f32
        },
        texture_variance: if skin_samples == 0 {
            0.0
        } else {
            jumps as f32 / skin_samples as f32 * 100.0
        },
        samples,
    }
}
