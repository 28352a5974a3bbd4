//! End-to-end classifier behaviour on synthetic images, with a scripted
//! landmark backend standing in for YuNet.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dermscan_vision::detector::BoxedDetector;
use dermscan_vision::face::{FaceBox, Keypoint, LandmarkName, YUNET_LANDMARKS};
use dermscan_vision::metrics::LOW_COVERAGE_WARNING;
use dermscan_vision::{
    ClassificationVerdict, Classifier, ClassifierError, DetectorHandle, FaceDetection,
    ImageSource, LandmarkDetector, PixelBuffer, Thresholds,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

const SKIN: [u8; 3] = [150, 110, 90];
const FOLIAGE: [u8; 3] = [60, 150, 50];
const GREY: [u8; 3] = [120, 118, 115];

#[derive(Clone)]
enum Script {
    Faces(Vec<FaceDetection>),
    Fail,
    Panic,
    /// Crash on the first call, then report these faces.
    PanicOnce(Vec<FaceDetection>),
}

struct ScriptedDetector(Script);

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _image: &PixelBuffer) -> Result<Vec<FaceDetection>, ClassifierError> {
        match &self.0 {
            Script::Faces(faces) => Ok(faces.clone()),
            Script::Fail => Err(ClassifierError::Detection("inference failed".into())),
            Script::Panic => panic!("backend crashed"),
            Script::PanicOnce(faces) => {
                self.0 = Script::Faces(faces.clone());
                panic!("backend crashed once");
            }
        }
    }
}

fn scripted(script: Script) -> (DetectorHandle, Arc<AtomicUsize>) {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let handle = DetectorHandle::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDetector(script.clone())) as BoxedDetector)
    });
    (handle, loads)
}

fn classifier(detector: DetectorHandle) -> Classifier {
    env_logger::try_init().ok();
    Classifier::new(Thresholds::default(), detector)
}

fn flat(size: u32, rgb: [u8; 3]) -> PixelBuffer {
    let [r, g, b] = rgb;
    PixelBuffer::from_rgba(RgbaImage::from_pixel(size, size, Rgba([r, g, b, 255]))).unwrap()
}

fn face(width: f32, height: f32, names: &[LandmarkName]) -> FaceDetection {
    FaceDetection {
        bbox: FaceBox {
            x: 40.0,
            y: 30.0,
            width,
            height,
        },
        score: 0.92,
        keypoints: names
            .iter()
            .map(|&name| Keypoint {
                name,
                x: 100.0,
                y: 100.0,
            })
            .collect(),
    }
}

fn frontal_face() -> FaceDetection {
    face(120.0, 160.0, &YUNET_LANDMARKS)
}

#[test]
fn flat_mid_brown_is_accepted_without_model() {
    let c = classifier(DetectorHandle::disabled());
    assert_eq!(c.classify(&flat(256, SKIN)), ClassificationVerdict::accept());
}

#[test]
fn foliage_without_face_is_rejected_as_animal() {
    let (detector, _) = scripted(Script::Faces(Vec::new()));
    let c = classifier(detector);
    assert!(!c.classify(&flat(256, FOLIAGE)).is_human_skin);
}

#[test]
fn brown_gray_without_face_is_rejected() {
    let (detector, _) = scripted(Script::Faces(Vec::new()));
    assert!(!classifier(detector).classify(&flat(256, GREY)).is_human_skin);
}

#[test]
fn skin_on_the_brown_gray_boundary_is_accepted_with_or_without_face_model() {
    // red leads green by exactly the skin gap
    let image = flat(256, [120, 105, 105]);
    assert!(classifier(DetectorHandle::disabled()).classify(&image).is_human_skin);

    let (detector, _) = scripted(Script::Faces(Vec::new()));
    let c = classifier(detector);
    assert_eq!(c.classify(&image), ClassificationVerdict::accept());
    assert!(c.detector().load_attempted());
}

#[test]
fn tiny_image_is_rejected_before_any_model_work() {
    let (detector, loads) = scripted(Script::Faces(vec![frontal_face()]));
    let c = classifier(detector);

    assert!(!c.classify(&flat(50, SKIN)).is_human_skin);
    assert!(!c.classify(&flat(99, SKIN)).is_human_skin);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert!(!c.detector().load_attempted());
}

#[test]
fn classification_is_idempotent() {
    let (detector, loads) = scripted(Script::Faces(vec![frontal_face()]));
    let c = classifier(detector);

    for image in [flat(256, SKIN), flat(256, FOLIAGE), flat(256, GREY)] {
        assert_eq!(c.classify(&image), c.classify(&image));
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn undecodable_bytes_are_rejected() {
    let c = classifier(DetectorHandle::disabled());
    assert!(!c.classify_bytes(b"\x89PNG but not really").is_human_skin);
    assert!(!c
        .classify_source(ImageSource::DataUrl("data:image/png;base64,@@@".into()))
        .is_human_skin);
}

#[test]
fn encoded_skin_photo_is_accepted() {
    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 150, Rgba([150, 110, 90, 255])))
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();

    let c = classifier(DetectorHandle::disabled());
    assert!(c.classify_bytes(png.get_ref()).is_human_skin);
}

#[test]
fn model_load_failure_downgrades_for_the_session() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let detector = DetectorHandle::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ClassifierError::ModelLoad("no such file".into()))
    });
    let c = classifier(detector);

    assert!(!c.classify(&flat(256, FOLIAGE)).is_human_skin);
    assert!(c.classify(&flat(256, SKIN)).is_human_skin);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn detection_error_falls_back_per_call() {
    let (detector, loads) = scripted(Script::Fail);
    let c = classifier(detector);

    assert!(c.classify(&flat(256, SKIN)).is_human_skin);
    assert!(!c.classify(&flat(256, FOLIAGE)).is_human_skin);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn backend_panic_is_not_human_skin() {
    let (detector, _) = scripted(Script::Panic);
    let c = classifier(detector);
    assert_eq!(c.classify(&flat(256, SKIN)), ClassificationVerdict::reject());
}

#[test]
fn backend_keeps_serving_after_a_panic() {
    // 30% skin next to flat grey: colour and texture alone accept it, the
    // fur check rejects it once a working detector reports no face
    let image = PixelBuffer::from_rgba(RgbaImage::from_fn(256, 256, |x, _| {
        let [r, g, b] = if x < 77 { SKIN } else { GREY };
        Rgba([r, g, b, 255])
    }))
    .unwrap();
    assert!(classifier(DetectorHandle::disabled()).classify(&image).is_human_skin);

    let (detector, loads) = scripted(Script::PanicOnce(Vec::new()));
    let c = classifier(detector);
    assert_eq!(c.classify(&flat(256, SKIN)), ClassificationVerdict::reject());
    assert!(!c.classify(&image).is_human_skin);
    assert!(c.classify(&flat(256, SKIN)).is_human_skin);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn verified_face_still_needs_skin_pixels() {
    let (detector, _) = scripted(Script::Faces(vec![frontal_face()]));
    let c = classifier(detector);

    assert!(c.classify(&flat(256, SKIN)).is_human_skin);
    assert!(!c.classify(&flat(256, FOLIAGE)).is_human_skin);
}

#[test]
fn high_skin_share_wins_regardless_of_face_outcome() {
    let scripts = [
        Script::Faces(Vec::new()),
        Script::Faces(vec![frontal_face()]),
        Script::Faces(vec![face(300.0, 100.0, &YUNET_LANDMARKS)]),
        Script::Faces(vec![face(120.0, 160.0, &[LandmarkName::NoseTip])]),
        Script::Fail,
    ];

    for script in scripts {
        let (detector, _) = scripted(script);
        assert!(classifier(detector).classify(&flat(256, SKIN)).is_human_skin);
    }
    assert!(classifier(DetectorHandle::disabled())
        .classify(&flat(256, SKIN))
        .is_human_skin);
}

#[test]
fn striped_fur_texture_is_rejected() {
    // two skin-toned columns, two dark columns, repeated: 50% skin, dense edges
    let img = RgbaImage::from_fn(256, 256, |x, _| {
        if (x / 2) % 2 == 0 {
            Rgba([150, 110, 90, 255])
        } else {
            Rgba([40, 30, 25, 255])
        }
    });
    let image = PixelBuffer::from_rgba(img).unwrap();
    let c = classifier(DetectorHandle::disabled());
    assert!(!c.classify(&image).is_human_skin);
}

#[test]
fn small_skin_patch_passes_with_warning() {
    let img = RgbaImage::from_fn(256, 256, |x, _| {
        if x < 31 {
            Rgba([150, 110, 90, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    let image = PixelBuffer::from_rgba(img).unwrap();
    let verdict = classifier(DetectorHandle::disabled()).classify(&image);

    assert!(verdict.is_human_skin);
    assert_eq!(verdict.warning.as_deref(), Some(LOW_COVERAGE_WARNING));
}
