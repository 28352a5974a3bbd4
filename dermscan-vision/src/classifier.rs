//! Skin / not-skin gate run before any paid diagnosis call.
//!
//! The decision is an ordered chain of [`Strategy`] values. Each one either
//! settles the verdict or defers to the next; the last strategy always
//! settles. Errors and panics anywhere in the chain reject the image.

use std::panic::{self, AssertUnwindSafe};

use crate::animal;
use crate::buffer::{self, ImageSource, PixelBuffer};
use crate::detector::DetectorHandle;
use crate::error::ClassifierError;
use crate::face::FaceDetection;
use crate::metrics::{self, SkinMetrics};
use crate::thresholds::Thresholds;
use crate::verdict::ClassificationVerdict;

/// Outcome of running the face detector for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceEvidence {
    NotChecked,
    /// Model missing or detection failed for this call.
    Unavailable,
    NoFace,
    Found(FaceDetection),
}

/// Per-call state shared by the strategies.
pub struct Context<'a> {
    pub image: &'a PixelBuffer,
    pub thresholds: &'a Thresholds,
    pub detector: &'a DetectorHandle,
    pub face: FaceEvidence,
    metrics: Option<SkinMetrics>,
}

impl<'a> Context<'a> {
    pub fn new(
        image: &'a PixelBuffer,
        thresholds: &'a Thresholds,
        detector: &'a DetectorHandle,
    ) -> Self {
        Self {
            image,
            thresholds,
            detector,
            face: FaceEvidence::NotChecked,
            metrics: None,
        }
    }

    /// Colour and texture statistics, computed on first use.
    pub fn metrics(&mut self) -> &SkinMetrics {
        let (image, thresholds) = (self.image, self.thresholds);
        self.metrics
            .get_or_insert_with(|| SkinMetrics::compute(image, thresholds))
    }

    pub fn basic_verdict(&mut self) -> ClassificationVerdict {
        let thresholds = self.thresholds;
        metrics::basic_verdict(self.metrics(), thresholds)
    }
}

pub enum Step {
    Verdict(ClassificationVerdict),
    Defer,
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &mut Context<'_>) -> Result<Step, ClassifierError>;
}

/// Too few pixels to say anything.
pub struct MinimumResolution;

impl Strategy for MinimumResolution {
    fn name(&self) -> &'static str {
        "minimum-resolution"
    }

    fn evaluate(&self, ctx: &mut Context<'_>) -> Result<Step, ClassifierError> {
        let min = ctx.thresholds.min_dimension;
        if ctx.image.width() < min || ctx.image.height() < min {
            log::info!(
                "rejecting: {}x{} is below the {}px minimum",
                ctx.image.width(),
                ctx.image.height(),
                min
            );
            return Ok(Step::Verdict(ClassificationVerdict::reject()));
        }
        Ok(Step::Defer)
    }
}

/// Face landmarks as corroborating evidence.
pub struct FaceLandmarks;

impl Strategy for FaceLandmarks {
    fn name(&self) -> &'static str {
        "face-landmarks"
    }

    fn evaluate(&self, ctx: &mut Context<'_>) -> Result<Step, ClassifierError> {
        if !ctx.detector.ensure_loaded() {
            ctx.face = FaceEvidence::Unavailable;
            return Ok(Step::Defer);
        }

        let face = match ctx.detector.detect(ctx.image) {
            Ok(Some(face)) => face,
            Ok(None) => {
                ctx.face = FaceEvidence::NoFace;
                return Ok(Step::Defer);
            }
            Err(e) => {
                log::warn!("{e}; falling back to colour and texture heuristics");
                ctx.face = FaceEvidence::Unavailable;
                return Ok(Step::Defer);
            }
        };
        ctx.face = FaceEvidence::Found(face.clone());

        let features = face.features();
        if !features.is_complete() {
            log::info!("face found but landmarks are incomplete ({features:?}); uncertain");
        }

        let band = ctx.thresholds.face.aspect_ratio;
        if !face.has_face_proportions(&band) {
            log::info!(
                "face aspect ratio {:.2} outside {:.2}..={:.2}",
                face.aspect_ratio(),
                band.min,
                band.max
            );
            return Ok(Step::Defer);
        }

        // a plausible face still needs skin-like pixels
        Ok(Step::Verdict(ctx.basic_verdict()))
    }
}

/// Foliage and fur colour distributions, only consulted when a working
/// detector saw no face.
pub struct AnimalColors;

impl Strategy for AnimalColors {
    fn name(&self) -> &'static str {
        "animal-colors"
    }

    fn evaluate(&self, ctx: &mut Context<'_>) -> Result<Step, ClassifierError> {
        if ctx.face != FaceEvidence::NoFace {
            return Ok(Step::Defer);
        }
        let limits = &ctx.thresholds.animal;
        let dist = animal::color_distribution(ctx.image, &ctx.thresholds.skin, limits);
        if dist.looks_like_animal(limits) {
            log::info!(
                "rejecting: green {:.1}% / brown-gray {:.1}% looks like an animal or nature photo",
                dist.green_pct,
                dist.brown_gray_pct
            );
            return Ok(Step::Verdict(ClassificationVerdict::reject()));
        }
        Ok(Step::Defer)
    }
}

/// Colour and texture alone. Always settles.
pub struct BasicHeuristic;

impl Strategy for BasicHeuristic {
    fn name(&self) -> &'static str {
        "basic-heuristic"
    }

    fn evaluate(&self, ctx: &mut Context<'_>) -> Result<Step, ClassifierError> {
        Ok(Step::Verdict(ctx.basic_verdict()))
    }
}

pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(MinimumResolution),
        Box::new(FaceLandmarks),
        Box::new(AnimalColors),
        Box::new(BasicHeuristic),
    ]
}

pub struct Classifier {
    thresholds: Thresholds,
    detector: DetectorHandle,
    strategies: Vec<Box<dyn Strategy>>,
}

impl Classifier {
    pub fn new(thresholds: Thresholds, detector: DetectorHandle) -> Self {
        Self {
            thresholds,
            detector,
            strategies: default_strategies(),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn detector(&self) -> &DetectorHandle {
        &self.detector
    }

    /// Decode and classify. Undecodable input is not human skin.
    pub fn classify_source(&self, source: ImageSource) -> ClassificationVerdict {
        self.classify_decoded(buffer::sample(source))
    }

    /// Same as [`Self::classify_source`] for encoded bytes the caller keeps.
    pub fn classify_bytes(&self, bytes: &[u8]) -> ClassificationVerdict {
        self.classify_decoded(PixelBuffer::decode(bytes))
    }

    fn classify_decoded(
        &self,
        decoded: Result<PixelBuffer, ClassifierError>,
    ) -> ClassificationVerdict {
        match decoded {
            Ok(image) => self.classify(&image),
            Err(e) => {
                log::warn!("{e}; rejecting image");
                ClassificationVerdict::reject()
            }
        }
    }

    /// Never panics and never errors: anything unexpected rejects the image.
    pub fn classify(&self, image: &PixelBuffer) -> ClassificationVerdict {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_chain(image)));
        match outcome {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                log::warn!("{e}; rejecting image");
                ClassificationVerdict::reject()
            }
            Err(_) => {
                log::error!("classifier panicked; rejecting image");
                ClassificationVerdict::reject()
            }
        }
    }

    fn run_chain(&self, image: &PixelBuffer) -> Result<ClassificationVerdict, ClassifierError> {
        let mut ctx = Context::new(image, &self.thresholds, &self.detector);
        for strategy in &self.strategies {
            if let Step::Verdict(verdict) = strategy.evaluate(&mut ctx)? {
                log::debug!("{} settled: {:?}", strategy.name(), verdict);
                return Ok(verdict);
            }
        }
        Err(ClassifierError::Unexpected(
            "no strategy produced a verdict".into(),
        ))
    }
}
