//! Decoded frame container.
//!
//! Sources produce `Frame` instances; detectors borrow their pixels for the
//! duration of a single `detect` call. Frames are dropped as soon as the
//! pipeline has recorded their detections, so at most one decoded frame is
//! alive at a time.

use anyhow::{anyhow, Result};

use crate::detect::{DetectionResult, DetectorBackend};

/// One decoded RGB24 frame.
pub struct Frame {
    /// Packed RGB24 rows, `width * height * 3` bytes.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// 1-based position in the stream, assigned by the source.
    pub index: u64,
}

impl Frame {
    /// Wrap decoded pixels. The buffer length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    /// Read-only pixel access.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Frame shape as `(height, width)`.
    pub fn shape(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Run a detector backend over this frame.
    pub fn run_detector(&self, detector: &mut dyn DetectorBackend) -> Result<DetectionResult> {
        detector.detect(&self.data, self.width, self.height)
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}
