//! Frame ingestion sources.
//!
//! This module provides sources of decoded frames for a recorded video:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` scenes (tests and demos)
//!
//! Every source yields frames in temporal order, numbered from 1, and
//! reports what it knows about the stream up front through `VideoInfo`.
//! Sources never write decoded frames anywhere.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
mod synthetic;

pub use file::FileSource;

/// Stream properties reported by a source when it is opened.
///
/// Fields are `None` when the container does not carry them; callers apply
/// their own fallbacks (see [`crate::effective_fps`]).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VideoInfo {
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frame count advertised by the container, if any. Only informational:
    /// the pipeline counts the frames it actually decodes.
    pub frame_count_hint: Option<u64>,
}
