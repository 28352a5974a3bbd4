//! Per-pixel skin tone rule in YCbCr space with RGB ratio guards.

use crate::buffer::{luma, PixelBuffer};
use crate::thresholds::SkinColorBands;

/// BT.601 full-range conversion. Returns `(y, cb, cr)`.
pub fn ycbcr(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
    (y, cb, cr)
}

pub fn is_skin_pixel(r: u8, g: u8, b: u8, bands: &SkinColorBands) -> bool {
    let (y, cb, cr) = ycbcr(r, g, b);
    if !(bands.luma.contains(y) && bands.cb.contains(cb) && bands.cr.contains(cr)) {
        return false;
    }

    // Red has to lead clearly; this drops flat reds and near-black pixels
    // that slip through the chroma bands.
    if r <= g || r <= b || r - g < bands.min_red_green_gap {
        return false;
    }
    if g == 0 || b == 0 {
        return false;
    }
    let rg = r as f32 / g as f32;
    let rb = r as f32 / b as f32;
    bands.red_green_ratio.contains(rg) && bands.red_blue_ratio.contains(rb)
}

/// Result of one pass over every visible pixel.
#[derive(Debug, Clone)]
pub struct SkinScan {
    /// Row-major, `true` where the pixel is visible and skin-like.
    pub mask: Vec<bool>,
    pub visible: usize,
    pub skin: usize,
    pub average_luminance: f32,
    pub channel_means: [f32; 3],
}

impl SkinScan {
    pub fn skin_percentage(&self) -> f32 {
        if self.visible == 0 {
            return 0.0;
        }
        self.skin as f32 / self.visible as f32 * 100.0
    }
}

pub fn scan(buffer: &PixelBuffer, bands: &SkinColorBands) -> SkinScan {
    let mut mask = Vec::with_capacity(buffer.pixel_count());
    let mut visible = 0usize;
    let mut skin = 0usize;
    let mut luma_sum = 0f64;
    let mut sums = [0f64; 3];

    for [r, g, b, a] in buffer.pixels() {
        if a < bands.min_alpha {
            mask.push(false);
            continue;
        }
        visible += 1;
        luma_sum += luma(r, g, b) as f64;
        sums[0] += r as f64;
        sums[1] += g as f64;
        sums[2] += b as f64;

        let is_skin = is_skin_pixel(r, g, b, bands);
        if is_skin {
            skin += 1;
        }
        mask.push(is_skin);
    }

    let n = visible.max(1) as f64;
    SkinScan {
        mask,
        visible,
        skin,
        average_luminance: (luma_sum / n) as f32,
        channel_means: [
            (sums[0] / n) as f32,
            (sums[1] / n) as f32,
            (sums[2] / n) as f32,
        ],
    }
}
