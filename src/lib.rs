pub mod config;
pub mod gateway;
pub mod history;
pub mod report;
pub mod service;

// Re-export vision types for convenience
pub use dermscan_vision::{
    ClassificationVerdict, Classifier, DetectorHandle, ImageSource, PixelBuffer, Thresholds,
};
