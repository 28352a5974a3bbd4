//! Colour and texture statistics, and the verdict they support on their own.

use crate::buffer::PixelBuffer;
use crate::skin;
use crate::texture;
use crate::thresholds::Thresholds;
use crate::verdict::ClassificationVerdict;

pub const LOW_COVERAGE_WARNING: &str =
    "Only a small part of the photo looks like skin; move closer to the affected area.";

#[derive(Debug, Clone, PartialEq)]
pub struct SkinMetrics {
    /// 0..=100
    pub skin_pixel_percentage: f32,
    /// 0..=1
    pub edge_density: f32,
    /// 0..=100
    pub texture_variance: f32,
    pub average_luminance: f32,
    /// Mean R, G, B over visible pixels.
    pub average_channel_means: [f32; 3],
}

impl SkinMetrics {
    pub fn compute(buffer: &PixelBuffer, thresholds: &Thresholds) -> Self {
        let scan = skin::scan(buffer, &thresholds.skin);
        let luma = buffer.luma_plane();
        let stats = texture::analyze(&luma, &scan.mask, &thresholds.texture);

        Self {
            skin_pixel_percentage: scan.skin_percentage(),
            edge_density: stats.edge_density,
            texture_variance: stats.texture_variance,
            average_luminance: scan.average_luminance,
            average_channel_means: scan.channel_means,
        }
    }

    pub fn edge_ceiling(&self, thresholds: &Thresholds) -> f32 {
        thresholds.texture.edge_ceiling(self.skin_pixel_percentage)
    }
}

/// Colour/texture verdict without any face evidence.
pub fn basic_verdict(metrics: &SkinMetrics, thresholds: &Thresholds) -> ClassificationVerdict {
    let skin = metrics.skin_pixel_percentage;
    let ceiling = metrics.edge_ceiling(thresholds);
    let decision = &thresholds.basic;

    log::debug!(
        "skin={:.1}% edges={:.3} (ceiling {:.2}) texture={:.1} luma={:.1}",
        skin,
        metrics.edge_density,
        ceiling,
        metrics.texture_variance,
        metrics.average_luminance
    );

    if skin > decision.color_override_pct {
        return ClassificationVerdict::accept();
    }
    if metrics.edge_density > ceiling {
        log::info!(
            "rejecting: edge density {:.3} above {:.2}, looks like fur or feathers",
            metrics.edge_density,
            ceiling
        );
        return ClassificationVerdict::reject();
    }
    if metrics.texture_variance > thresholds.texture.max_texture_variance {
        log::info!(
            "rejecting: texture variance {:.1} too high for skin",
            metrics.texture_variance
        );
        return ClassificationVerdict::reject();
    }
    if skin >= decision.accept_skin_pct {
        return ClassificationVerdict::accept();
    }
    if skin >= decision.warn_skin_pct {
        return ClassificationVerdict::accept_with_warning(LOW_COVERAGE_WARNING);
    }

    log::info!("rejecting: only {:.1}% skin-like pixels", skin);
    ClassificationVerdict::reject()
}
