use thiserror::Error;

/// Failures inside the classification pipeline.
///
/// None of these cross the [`crate::Classifier`] boundary: every variant is
/// turned into a verdict (or a downgrade to the colour/texture heuristic)
/// before the caller sees anything.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to load face landmark model: {0}")]
    ModelLoad(String),

    #[error("face landmark detection failed: {0}")]
    Detection(String),

    #[error("unexpected classifier failure: {0}")]
    Unexpected(String),
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for ClassifierError {
    fn from(err: base64::DecodeError) -> Self {
        ClassifierError::Decode(format!("invalid base64 payload: {err}"))
    }
}
