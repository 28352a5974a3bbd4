pub mod animal;
pub mod buffer;
pub mod classifier;
pub mod detector;
pub mod error;
pub mod face;
pub mod metrics;
pub mod model;
pub mod skin;
pub mod texture;
pub mod thresholds;
pub mod verdict;
pub mod video;
pub mod yunet;

// Re-export commonly used types
pub use buffer::{ImageSource, PixelBuffer};
pub use classifier::Classifier;
pub use detector::DetectorHandle;
pub use error::ClassifierError;
pub use face::{FaceDetection, LandmarkDetector, YunetDetector};
pub use metrics::SkinMetrics;
pub use thresholds::Thresholds;
pub use verdict::ClassificationVerdict;
pub use video::Camera;
