//! Occupancy Mapper
//!
//! Turns a recorded video into occupancy statistics and a spatial density
//! heatmap of where people were observed.
//!
//! # Architecture
//!
//! The pipeline is strictly sequential:
//!
//! 1. **Ingest**: a `FileSource` decodes the video into RGB `Frame`s.
//! 2. **Detect**: an explicitly constructed `DetectorBackend` locates people in
//!    each frame; person boxes are reduced to integer center points.
//! 3. **Aggregate**: `compute_stats` folds the per-frame point lists into an
//!    `OccupancyStats` record. This step is pure.
//! 4. **Render**: `render_heatmap` turns every point into a density raster.
//! 5. **Report**: a `ReportSink` persists the CSV/JSON/PNG artifacts.
//!
//! # Module Structure
//!
//! - `frame`: decoded frame container
//! - `ingest`: frame sources (FFmpeg files, synthetic `stub://` scenes)
//! - `detect`: detector backends and their results
//! - `pipeline`: drives source + detector over a whole video
//! - `stats`: occupancy aggregation
//! - `heatmap`: spatial density rendering
//! - `sink`: artifact writers
//! - `config`: layered configuration

use serde::{Deserialize, Serialize};

pub mod config;
pub mod detect;
pub mod frame;
pub mod heatmap;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod stats;

pub use config::MapperConfig;
pub use detect::{build_backend, BoundingBox, DetectionResult, DetectorBackend, ObjectClass};
pub use frame::Frame;
pub use heatmap::{render_heatmap, HeatmapOptions};
pub use ingest::{file::FileConfig, FileSource, VideoInfo};
pub use pipeline::{
    process_video, process_video_with_progress, process_video_with_settings, ProcessOptions,
    ProcessResult,
};
pub use sink::{DirectorySink, MemorySink, ReportSink};
pub use stats::{compute_stats, OccupancyStats};

/// Frame rate assumed when the source does not report a usable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Frame shape `(height, width)` assumed when the source reports no dimensions.
pub const DEFAULT_FRAME_SHAPE: (u32, u32) = (720, 1280);

/// A detected person's center in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// One entry per processed frame, in temporal order.
pub type FrameDetectionList = Vec<Vec<Point>>;

/// Resolve a reported frame rate, falling back to [`DEFAULT_FPS`] when the
/// source reports nothing, zero, a negative rate, or a non-finite value.
pub fn effective_fps(reported: Option<f64>) -> f64 {
    match reported {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => DEFAULT_FPS,
    }
}

/// Flatten per-frame detections into a single point list (frame order kept).
pub fn flatten_points(frames: &[Vec<Point>]) -> Vec<Point> {
    frames.iter().flatten().copied().collect()
}
