use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::buffer::PixelBuffer;
use crate::error::ClassifierError;
use crate::thresholds::{Band, FaceLimits};
use crate::yunet;

/// YuNet input is a fixed 640x640 canvas.
const INPUT_SIZE: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkName {
    LeftEye,
    RightEye,
    NoseTip,
    MouthLeft,
    MouthRight,
}

/// YuNet landmark order.
pub const YUNET_LANDMARKS: [LandmarkName; 5] = [
    LandmarkName::LeftEye,
    LandmarkName::RightEye,
    LandmarkName::NoseTip,
    LandmarkName::MouthLeft,
    LandmarkName::MouthRight,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub name: LandmarkName,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected face, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub bbox: FaceBox,
    pub score: f32,
    /// Landmarks that fell inside the image. Missing ones are simply absent.
    pub keypoints: Vec<Keypoint>,
}

/// Which facial features a detection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureCheck {
    pub left_eye: bool,
    pub right_eye: bool,
    pub nose: bool,
    pub mouth: bool,
}

impl FeatureCheck {
    /// Two of {eyes, nose, mouth}, or both eyes on their own.
    pub fn is_complete(&self) -> bool {
        let eyes = self.left_eye || self.right_eye;
        let present = [eyes, self.nose, self.mouth].iter().filter(|&&p| p).count();
        present >= 2 || (self.left_eye && self.right_eye)
    }
}

impl FaceDetection {
    pub fn aspect_ratio(&self) -> f32 {
        if self.bbox.height <= 0.0 {
            return 0.0;
        }
        self.bbox.width / self.bbox.height
    }

    pub fn has(&self, name: LandmarkName) -> bool {
        self.keypoints.iter().any(|k| k.name == name)
    }

    pub fn features(&self) -> FeatureCheck {
        FeatureCheck {
            left_eye: self.has(LandmarkName::LeftEye),
            right_eye: self.has(LandmarkName::RightEye),
            nose: self.has(LandmarkName::NoseTip),
            mouth: self.has(LandmarkName::MouthLeft) || self.has(LandmarkName::MouthRight),
        }
    }

    pub fn has_face_proportions(&self, band: &Band<f32>) -> bool {
        band.contains(self.aspect_ratio())
    }
}

/// Backend that finds faces and their landmarks.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, image: &PixelBuffer) -> Result<Vec<FaceDetection>, ClassifierError>;
}

/// Highest scoring face, the only one the classifier looks at.
pub fn most_prominent(faces: Vec<FaceDetection>) -> Option<FaceDetection> {
    faces.into_iter().max_by(|a, b| a.score.total_cmp(&b.score))
}

/// YuNet on ONNX Runtime.
pub struct YunetDetector {
    session: Session,
    score_threshold: f32,
    nms_threshold: f32,
}

impl YunetDetector {
    pub fn load(model_path: &Path, limits: &FaceLimits) -> Result<Self> {
        Ok(Self {
            session: crate::model::detector_session(model_path)?,
            score_threshold: limits.score_threshold,
            nms_threshold: limits.nms_threshold,
        })
    }
}

impl LandmarkDetector for YunetDetector {
    fn detect(&mut self, image: &PixelBuffer) -> Result<Vec<FaceDetection>, ClassifierError> {
        detect_faces(
            &mut self.session,
            &image.to_dynamic(),
            self.score_threshold,
            self.nms_threshold,
        )
        .map_err(|e| ClassifierError::Detection(format!("{e:#}")))
    }
}

/// Letterbox `img` into the 640x640 canvas, run YuNet and map the faces back
/// to source coordinates.
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<FaceDetection>> {
    let (orig_width, orig_height) = img.dimensions();
    let scale = INPUT_SIZE as f32 / orig_width.max(orig_height) as f32;
    let new_width = ((orig_width as f32 * scale) as u32).max(1);
    let new_height = ((orig_height as f32 * scale) as u32).max(1);

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle);
    let mut canvas = DynamicImage::new_rgb8(INPUT_SIZE, INPUT_SIZE);
    let offset_x = (INPUT_SIZE - new_width) / 2;
    let offset_y = (INPUT_SIZE - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);
    let canvas = canvas.to_rgb8();

    // planar BGR, values in 0..=255
    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input = vec![0.0f32; 3 * plane];
    for (i, px) in canvas.pixels().enumerate() {
        input[i] = px[2] as f32;
        input[plane + i] = px[1] as f32;
        input[2 * plane + i] = px[0] as f32;
    }
    let side = INPUT_SIZE as usize;
    let input_tensor = Value::from_array(Array4::from_shape_vec((1, 3, side, side), input)?)?;

    let outputs = session.run(ort::inputs![input_tensor])?;

    let mut owned: Vec<(String, Vec<i64>, Vec<f32>)> = Vec::new();
    for (name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        owned.push((name.to_string(), shape.iter().copied().collect(), data.to_vec()));
    }
    let raw: Vec<yunet::RawTensor<'_>> = owned
        .iter()
        .map(|(name, shape, data)| yunet::RawTensor {
            name,
            shape,
            data,
        })
        .collect();

    let scales = yunet::parse_outputs(&raw, side)?;
    let candidates = yunet::decode(&scales, score_threshold, side);
    log::debug!("yunet: {} candidates above {:.2}", candidates.len(), score_threshold);

    let to_source = |v: f32, offset: u32| (v - offset as f32) / scale;
    let mut faces: Vec<FaceDetection> = candidates
        .into_iter()
        .map(|c| {
            let keypoints = YUNET_LANDMARKS
                .iter()
                .enumerate()
                .map(|(k, &name)| Keypoint {
                    name,
                    x: to_source(c.landmarks[k * 2], offset_x),
                    y: to_source(c.landmarks[k * 2 + 1], offset_y),
                })
                .filter(|k| {
                    k.x >= 0.0 && k.y >= 0.0 && k.x < orig_width as f32 && k.y < orig_height as f32
                })
                .collect();

            FaceDetection {
                bbox: FaceBox {
                    x: to_source(c.bbox[0], offset_x),
                    y: to_source(c.bbox[1], offset_y),
                    width: c.bbox[2] / scale,
                    height: c.bbox[3] / scale,
                },
                score: c.score,
                keypoints,
            }
        })
        .collect();

    if nms_threshold < 1.0 {
        faces = nms(faces, nms_threshold);
    }

    Ok(faces)
}

/// Greedy non-maximum suppression, highest score first.
pub fn nms(mut faces: Vec<FaceDetection>, iou_threshold: f32) -> Vec<FaceDetection> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceDetection> = Vec::new();
    for face in faces {
        if keep
            .iter()
            .all(|kept| compute_iou(&kept.bbox, &face.bbox) <= iou_threshold)
        {
            keep.push(face);
        }
    }
    keep
}

fn compute_iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    inter / (a.width * a.height + b.width * b.height - inter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32, score: f32, names: &[LandmarkName]) -> FaceDetection {
        FaceDetection {
            bbox: FaceBox {
                x,
                y,
                width: w,
                height: h,
            },
            score,
            keypoints: names
                .iter()
                .map(|&name| Keypoint { name, x: 0.0, y: 0.0 })
                .collect(),
        }
    }

    #[test]
    fn test_iou() {
        let a = face(10.0, 10.0, 20.0, 20.0, 0.9, &[]).bbox;
        let b = face(15.0, 15.0, 20.0, 20.0, 0.9, &[]).bbox;
        let iou = compute_iou(&a, &b);
        assert!(iou > 0.0 && iou < 1.0);

        let c = face(100.0, 100.0, 10.0, 10.0, 0.9, &[]).bbox;
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_nms() {
        let faces = vec![
            face(12.0, 12.0, 20.0, 20.0, 0.8, &[]),
            face(10.0, 10.0, 20.0, 20.0, 0.9, &[]),
            face(100.0, 100.0, 20.0, 20.0, 0.85, &[]),
        ];
        let kept = nms(faces, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.85);
    }

    #[test]
    fn test_feature_completeness() {
        use LandmarkName::*;

        assert!(face(0.0, 0.0, 1.0, 1.0, 1.0, &YUNET_LANDMARKS).features().is_complete());
        assert!(face(0.0, 0.0, 1.0, 1.0, 1.0, &[LeftEye, RightEye]).features().is_complete());
        assert!(face(0.0, 0.0, 1.0, 1.0, 1.0, &[LeftEye, NoseTip]).features().is_complete());
        assert!(face(0.0, 0.0, 1.0, 1.0, 1.0, &[NoseTip, MouthRight]).features().is_complete());
        assert!(!face(0.0, 0.0, 1.0, 1.0, 1.0, &[LeftEye]).features().is_complete());
        assert!(!face(0.0, 0.0, 1.0, 1.0, 1.0, &[MouthLeft, MouthRight]).features().is_complete());
    }

    #[test]
    fn test_proportions_and_prominence() {
        let band = FaceLimits::default().aspect_ratio;
        assert!(face(0.0, 0.0, 75.0, 100.0, 0.7, &[]).has_face_proportions(&band));
        assert!(!face(0.0, 0.0, 150.0, 100.0, 0.7, &[]).has_face_proportions(&band));

        let best = most_prominent(vec![
            face(0.0, 0.0, 10.0, 10.0, 0.7, &[]),
            face(5.0, 5.0, 10.0, 10.0, 0.95, &[]),
        ])
        .unwrap();
        assert_eq!(best.score, 0.95);
        assert!(most_prominent(Vec::new()).is_none());
    }
}
