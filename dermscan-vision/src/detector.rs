//! Session-wide face landmark detector, loaded at most once.

use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::buffer::PixelBuffer;
use crate::error::ClassifierError;
use crate::face::{self, FaceDetection, LandmarkDetector};

pub type BoxedDetector = Box<dyn LandmarkDetector>;
type Loader = dyn Fn() -> Result<BoxedDetector, ClassifierError> + Send + Sync;

/// Lazily loaded detector shared by every classification call.
///
/// The first caller runs the loader; concurrent callers wait for it. The
/// outcome is cached either way, so a failed load is never retried and
/// later calls go straight to the colour/texture heuristics.
pub struct DetectorHandle {
    loader: Arc<Loader>,
    load_timeout: Option<Duration>,
    slot: OnceCell<Option<Mutex<BoxedDetector>>>,
}

impl DetectorHandle {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<BoxedDetector, ClassifierError> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            load_timeout: None,
            slot: OnceCell::new(),
        }
    }

    /// Give up on a load that has not finished after `timeout`.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Handle whose model is never available.
    pub fn disabled() -> Self {
        Self::new(|| Err(ClassifierError::ModelLoad("face landmarks disabled".into())))
    }

    pub fn load_attempted(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Load the detector if nobody has tried yet. Returns whether it is usable.
    pub fn ensure_loaded(&self) -> bool {
        self.slot
            .get_or_init(|| match self.load() {
                Ok(detector) => {
                    log::info!("face landmark model loaded");
                    Some(Mutex::new(detector))
                }
                Err(e) => {
                    log::warn!("{e}; using colour and texture heuristics for this session");
                    None
                }
            })
            .is_some()
    }

    /// Most prominent face, `Ok(None)` when there is none.
    ///
    /// Callers should check [`Self::ensure_loaded`] first; an unavailable
    /// model is reported as a load error. A backend that panicked on an
    /// earlier call stays in use.
    pub fn detect(&self, image: &PixelBuffer) -> Result<Option<FaceDetection>, ClassifierError> {
        let Some(Some(slot)) = self.slot.get() else {
            return Err(ClassifierError::ModelLoad("face landmark model unavailable".into()));
        };
        let mut detector = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let faces = detector.detect(image)?;
        log::debug!("{} face(s) detected", faces.len());
        Ok(face::most_prominent(faces))
    }

    fn load(&self) -> Result<BoxedDetector, ClassifierError> {
        let Some(timeout) = self.load_timeout else {
            return (self.loader)();
        };

        // A hung backend keeps its thread, but the caller moves on.
        let (tx, rx) = mpsc::channel();
        let loader = Arc::clone(&self.loader);
        std::thread::Builder::new()
            .name("landmark-model-load".into())
            .spawn(move || {
                let _ = tx.send(loader());
            })
            .map_err(|e| ClassifierError::ModelLoad(format!("spawning loader: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ClassifierError::ModelLoad(format!(
                "model load did not finish within {timeout:?}"
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ClassifierError::ModelLoad(
                "model loader exited without a result".into(),
            )),
        }
    }
}
