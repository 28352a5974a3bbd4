use std::path::Path;

use anyhow::{Context, Result};
#[cfg(any(feature = "openvino", feature = "cuda"))]
use ort::ep::{self, ExecutionProvider};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

/// File name of the YuNet release this crate decodes.
pub const DETECTOR_MODEL_FILE: &str = "face_detection_yunet_2023mar.onnx";

/// Session builder with every accelerator enabled at compile time.
///
/// Accelerators are best effort: the distro ONNX Runtime is often built
/// without them, and the CPU provider is enough for one 640px frame.
pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?;

    #[cfg(feature = "openvino")]
    register_if_available(&mut builder, ep::OpenVINO::default(), "openvino")?;
    #[cfg(feature = "cuda")]
    register_if_available(&mut builder, ep::CUDA::default(), "cuda")?;

    Ok(builder)
}

#[cfg(any(feature = "openvino", feature = "cuda"))]
fn register_if_available(
    builder: &mut SessionBuilder,
    provider: impl ExecutionProvider,
    name: &str,
) -> Result<()> {
    if provider.is_available()? {
        provider.register(builder)?;
        log::info!("{name} execution provider registered");
    } else {
        log::warn!("{name} feature is enabled, onnx runtime not compiled with {name}");
    }
    Ok(())
}

pub fn detector_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!("face landmark model not found at {}", path.display());
    }
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load detector model {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let err = detector_session(Path::new("/nonexistent/dermscan/yunet.onnx"))
            .err()
            .expect("a missing model must not load");
        assert!(err.to_string().contains("not found"), "{err:#}");
    }
}
