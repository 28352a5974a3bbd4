//! Skin check first, paid diagnosis second.

use std::sync::Arc;

use dermscan_vision::{ClassificationVerdict, Classifier, ImageSource};

use crate::gateway::{ApiOutcome, DiagnosisApi, GatewayError};
use crate::report::DiagnosisReport;

pub const REJECTION_MESSAGE: &str = "This does not look like a photo of human skin. \
     Retake the photo close to the affected area in good light.";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rejected { message: String },
    Diagnosed(DiagnosisReport),
}

impl Outcome {
    fn rejected() -> Self {
        Outcome::Rejected {
            message: REJECTION_MESSAGE.to_string(),
        }
    }
}

/// Run the pixel scans on the blocking pool so the async caller stays responsive.
pub async fn classify_in_background(
    classifier: Arc<Classifier>,
    source: ImageSource,
) -> ClassificationVerdict {
    on_blocking_pool(move || classifier.classify_source(source))
        .await
        .unwrap_or_else(ClassificationVerdict::reject)
}

async fn on_blocking_pool<T, F>(task: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(out) => Some(out),
        Err(e) => {
            log::error!("classification task failed: {e}");
            None
        }
    }
}

pub struct DiagnosisService<A> {
    classifier: Arc<Classifier>,
    api: A,
}

impl<A: DiagnosisApi> DiagnosisService<A> {
    pub fn new(classifier: Arc<Classifier>, api: A) -> Self {
        Self { classifier, api }
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// Classify `image` and, only if it looks like skin, send it for diagnosis.
    pub async fn diagnose(&self, image: Vec<u8>) -> Result<Outcome, GatewayError> {
        // the upload travels to the blocking task and back instead of being cloned
        let classifier = Arc::clone(&self.classifier);
        let classified = on_blocking_pool(move || {
            let verdict = classifier.classify_bytes(&image);
            (verdict, image)
        })
        .await;
        let Some((verdict, image)) = classified else {
            return Ok(Outcome::rejected());
        };
        if !verdict.is_human_skin {
            return Ok(Outcome::rejected());
        }
        if let Some(warning) = &verdict.warning {
            log::warn!("{warning}");
        }

        let mime = image::guess_format(&image)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");

        match self.api.diagnose(&image, mime).await? {
            ApiOutcome::NotSkin(reason) => {
                log::info!("diagnosis service rejected the image: {reason}");
                Ok(Outcome::rejected())
            }
            ApiOutcome::Predictions(predictions) => Ok(Outcome::Diagnosed(
                DiagnosisReport::from_predictions(predictions, verdict.warning),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Prediction;
    use crate::report::Severity;
    use async_trait::async_trait;
    use dermscan_vision::{DetectorHandle, Thresholds};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeApi {
        calls: AtomicUsize,
        received: Mutex<Vec<u8>>,
        outcome: ApiOutcome,
    }

    impl FakeApi {
        fn new(outcome: ApiOutcome) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
                outcome,
            }
        }
    }

    #[async_trait]
    impl DiagnosisApi for FakeApi {
        async fn diagnose(&self, image: &[u8], mime: &str) -> Result<ApiOutcome, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(mime, "image/png");
            *self.received.lock().unwrap() = image.to_vec();
            Ok(self.outcome.clone())
        }
    }

    fn png(size: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(size, size, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn service(outcome: ApiOutcome) -> DiagnosisService<FakeApi> {
        let classifier = Classifier::new(Thresholds::default(), DetectorHandle::disabled());
        DiagnosisService::new(Arc::new(classifier), FakeApi::new(outcome))
    }

    fn melanoma() -> ApiOutcome {
        ApiOutcome::Predictions(vec![Prediction {
            name: "Melanoma".into(),
            confidence: 0.9,
            icd: Some("C43".into()),
            url: None,
        }])
    }

    #[tokio::test]
    async fn test_non_skin_never_reaches_api() {
        let svc = service(melanoma());

        let foliage = svc.diagnose(png(256, [60, 150, 50])).await.unwrap();
        let tiny = svc.diagnose(png(50, [150, 110, 90])).await.unwrap();
        let garbage = svc.diagnose(b"not an image".to_vec()).await.unwrap();

        for outcome in [foliage, tiny, garbage] {
            assert_eq!(outcome, Outcome::rejected());
        }
        assert_eq!(svc.api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skin_is_diagnosed() {
        let svc = service(melanoma());
        let Outcome::Diagnosed(report) = svc.diagnose(png(256, [150, 110, 90])).await.unwrap()
        else {
            panic!("expected a report");
        };
        assert_eq!(report.severity, Severity::Severe);
        assert_eq!(svc.api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_api_receives_the_original_upload() {
        let svc = service(melanoma());
        let upload = png(256, [150, 110, 90]);
        svc.diagnose(upload.clone()).await.unwrap();
        assert_eq!(*svc.api.received.lock().unwrap(), upload);
    }

    #[tokio::test]
    async fn test_remote_rejection_matches_local() {
        let svc = service(ApiOutcome::NotSkin("image is not of skin".into()));
        let outcome = svc.diagnose(png(256, [150, 110, 90])).await.unwrap();
        assert_eq!(outcome, Outcome::rejected());
    }
}
