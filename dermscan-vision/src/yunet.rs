//! YuNet post-processing.
//!
//! YuNet is anchor-free: every cell of the stride 8, 16 and 32 feature grids
//! predicts one candidate face. Per stride the network emits four tensors,
//! each shaped `[1, cells, C]`:
//! - `cls_<stride>` (C = 1) and `obj_<stride>` (C = 1), already sigmoid-activated
//! - `bbox_<stride>` (C = 4): `dx, dy, log_w, log_h` in stride units
//! - `kps_<stride>` (C = 10): five `(dx, dy)` landmark offsets
//!
//! For the cell at `(row, col)`:
//! cx = (col + dx) * stride, w = exp(log_w) * stride, score = sqrt(cls * obj)

use anyhow::{Context, Result};
use ndarray::Array2;

pub const STRIDES: [usize; 3] = [8, 16, 32];

/// Face candidate in input-canvas pixels.
#[derive(Debug, Clone)]
pub struct RawFace {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10],
}

/// Output tensors for one stride, reshaped to `[cells, C]`.
#[derive(Debug, Clone)]
pub struct ScaleOutput {
    pub stride: usize,
    pub cls: Array2<f32>,
    pub obj: Array2<f32>,
    pub bbox: Array2<f32>,
    pub kps: Array2<f32>,
}

/// Named raw tensor as returned by the runtime.
pub struct RawTensor<'a> {
    pub name: &'a str,
    pub shape: &'a [i64],
    pub data: &'a [f32],
}

const KINDS: [(&str, usize); 4] = [("cls", 1), ("obj", 1), ("bbox", 4), ("kps", 10)];

/// Group the twelve YuNet outputs by stride.
///
/// Tensors are looked up by name first; exports that renamed their outputs
/// fall back to the reference order `cls_*, obj_*, bbox_*, kps_*`.
pub fn parse_outputs(outputs: &[RawTensor<'_>], input_size: usize) -> Result<Vec<ScaleOutput>> {
    let mut scales = Vec::with_capacity(STRIDES.len());

    for (scale_idx, &stride) in STRIDES.iter().enumerate() {
        let cells = (input_size / stride) * (input_size / stride);
        let mut tensors = Vec::with_capacity(KINDS.len());

        for (kind_idx, &(kind, channels)) in KINDS.iter().enumerate() {
            let name = format!("{kind}_{stride}");
            let raw = outputs
                .iter()
                .find(|t| t.name == name)
                .or_else(|| outputs.get(kind_idx * STRIDES.len() + scale_idx))
                .with_context(|| format!("missing YuNet output {name}"))?;

            let expected = [1, cells as i64, channels as i64];
            if raw.shape != &expected[..] {
                anyhow::bail!(
                    "unexpected shape for {}: {:?}, expected {:?}",
                    name,
                    raw.shape,
                    expected
                );
            }
            tensors.push(Array2::from_shape_vec((cells, channels), raw.data.to_vec())?);
        }

        let mut it = tensors.into_iter();
        // KINDS has four entries, so all four are present
        let (Some(cls), Some(obj), Some(bbox), Some(kps)) =
            (it.next(), it.next(), it.next(), it.next())
        else {
            anyhow::bail!("incomplete YuNet outputs for stride {stride}");
        };
        scales.push(ScaleOutput {
            stride,
            cls,
            obj,
            bbox,
            kps,
        });
    }

    Ok(scales)
}

/// Decode every cell scoring at least `score_threshold`.
pub fn decode(scales: &[ScaleOutput], score_threshold: f32, input_size: usize) -> Vec<RawFace> {
    let mut faces = Vec::new();

    for scale in scales {
        let cols = input_size / scale.stride;
        let stride = scale.stride as f32;

        for idx in 0..scale.cls.nrows() {
            let cls = scale.cls[[idx, 0]].clamp(0.0, 1.0);
            let obj = scale.obj[[idx, 0]].clamp(0.0, 1.0);
            let score = (cls * obj).sqrt();
            if score < score_threshold {
                continue;
            }

            let row = (idx / cols) as f32;
            let col = (idx % cols) as f32;

            let cx = (col + scale.bbox[[idx, 0]]) * stride;
            let cy = (row + scale.bbox[[idx, 1]]) * stride;
            let w = scale.bbox[[idx, 2]].exp() * stride;
            let h = scale.bbox[[idx, 3]].exp() * stride;

            let mut landmarks = [0.0f32; 10];
            for k in 0..5 {
                landmarks[k * 2] = (col + scale.kps[[idx, k * 2]]) * stride;
                landmarks[k * 2 + 1] = (row + scale.kps[[idx, k * 2 + 1]]) * stride;
            }

            faces.push(RawFace {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }

    faces
}
