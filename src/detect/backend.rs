use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detector backend trait.
///
/// A backend is constructed once (model loading happens in its constructor)
/// and owned by the caller for the whole run. It receives each frame's
/// packed RGB24 pixels and returns bounding boxes in frame pixel space.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// The pixel slice is only valid for the duration of the call.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
