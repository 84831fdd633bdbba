mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;

pub use backend::DetectorBackend;
pub use backends::CpuBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{non_max_suppression, BoundingBox, DetectionResult, ObjectClass};

/// Construct the configured detector backend.
///
/// The returned instance is owned by the caller and passed into
/// [`crate::pipeline::process_video`]; nothing is cached globally.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "cpu" => Ok(Box::new(CpuBackend::new())),
        "tract" => build_tract(settings),
        other => Err(anyhow!(
            "unknown detector backend '{}' (expected 'tract' or 'cpu')",
            other
        )),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let backend = TractBackend::new(&settings.model_path, settings.input_size)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(_settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "the tract detector backend requires the backend-tract feature"
    ))
}
