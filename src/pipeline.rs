//! Video processing.
//!
//! `process_video` drives a [`FileSource`] and a caller-owned
//! [`DetectorBackend`] over every frame of a video and collects the person
//! centers per frame. It is best-effort: an unreadable video yields an empty
//! result rather than an error, a failing detector call counts as an empty
//! frame, and a decode failure mid-stream ends the stream early.

use crate::config::DetectorSettings;
use crate::detect::{build_backend, DetectorBackend};
use crate::ingest::file::{FileConfig, FileSource};
use crate::{effective_fps, FrameDetectionList, Point, DEFAULT_FRAME_SHAPE};

/// Knobs for a processing run.
#[derive(Clone, Debug)]
pub struct ProcessOptions {
    /// Log a progress line every N frames (0 disables progress lines).
    pub progress_interval: u64,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            progress_interval: 30,
        }
    }
}

/// Everything the aggregation and rendering stages need from a video.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessResult {
    /// One entry per decoded frame, in order.
    pub detections_per_frame: FrameDetectionList,
    /// Frames actually decoded.
    pub frame_count: u64,
    /// Source frame rate, after the 30 fps fallback. 0.0 for an empty result.
    pub fps: f64,
    /// `(height, width)` of the frames.
    pub frame_shape: (u32, u32),
}

impl ProcessResult {
    /// Result for a video that could not be opened.
    pub fn empty() -> Self {
        Self {
            detections_per_frame: Vec::new(),
            frame_count: 0,
            fps: 0.0,
            frame_shape: (0, 0),
        }
    }

    /// All detection points across frames, in frame order.
    pub fn all_points(&self) -> Vec<Point> {
        crate::flatten_points(&self.detections_per_frame)
    }
}

/// Run `detector` over every frame of the video at `video_path`.
pub fn process_video(
    video_path: &str,
    detector: &mut dyn DetectorBackend,
    options: &ProcessOptions,
) -> ProcessResult {
    process_video_with_progress(video_path, detector, options, &mut |_, _| {})
}

/// Build the detector described by `settings`, then process the video.
///
/// A detector that cannot be built is treated like an unreadable video: the
/// error is logged and the result is empty. A failed warm-up only warns.
pub fn process_video_with_settings(
    video_path: &str,
    settings: &DetectorSettings,
    options: &ProcessOptions,
    on_frame: &mut dyn FnMut(u64, Option<u64>),
) -> ProcessResult {
    let mut detector = match build_backend(settings) {
        Ok(detector) => detector,
        Err(e) => {
            log::error!("could not build detector '{}': {:#}", settings.backend, e);
            return ProcessResult::empty();
        }
    };
    if let Err(e) = detector.warm_up() {
        log::warn!("detector warm-up failed: {:#}", e);
    }
    process_video_with_progress(video_path, detector.as_mut(), options, on_frame)
}

/// [`process_video`] that also reports `(frames_done, frame_count_hint)`
/// after every frame.
pub fn process_video_with_progress(
    video_path: &str,
    detector: &mut dyn DetectorBackend,
    options: &ProcessOptions,
    on_frame: &mut dyn FnMut(u64, Option<u64>),
) -> ProcessResult {
    let mut source = match FileSource::open(FileConfig::new(video_path)) {
        Ok(source) => source,
        Err(e) => {
            log::error!("could not open video {}: {:#}", video_path, e);
            return ProcessResult::empty();
        }
    };

    let info = source.info();
    let fps = effective_fps(info.fps);
    if info.fps != Some(fps) {
        log::warn!(
            "video reports fps {:?}; assuming {} fps",
            info.fps,
            fps
        );
    }
    let mut frame_shape = match (info.height, info.width) {
        (Some(h), Some(w)) => (h, w),
        _ => DEFAULT_FRAME_SHAPE,
    };

    log::info!(
        "processing {} with detector '{}' ({} fps, {}x{})",
        video_path,
        detector.name(),
        fps,
        frame_shape.1,
        frame_shape.0
    );

    let mut detections_per_frame = FrameDetectionList::new();
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                log::warn!(
                    "decode failed after {} frames, stopping: {:#}",
                    detections_per_frame.len(),
                    e
                );
                break;
            }
        };
        if detections_per_frame.is_empty() {
            frame_shape = frame.shape();
        }

        let centers = match frame.run_detector(detector) {
            Ok(result) => result.person_centers(),
            Err(e) => {
                log::warn!("detection failed on frame {}: {:#}", frame.index, e);
                Vec::new()
            }
        };
        detections_per_frame.push(centers);

        let processed = detections_per_frame.len() as u64;
        on_frame(processed, info.frame_count_hint);
        if options.progress_interval > 0 && processed % options.progress_interval == 0 {
            log::info!("processed {} frames...", processed);
        }
    }

    let read = source.stats();
    let frame_count = read.frames_read;
    log::info!(
        "video processed: {} frames analyzed from {}",
        frame_count,
        read.path
    );

    ProcessResult {
        detections_per_frame,
        frame_count,
        fps,
        frame_shape,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, CpuBackend, DetectionResult};
    use anyhow::{anyhow, Result};

    struct FailingEveryOther {
        calls: u64,
    }

    impl DetectorBackend for FailingEveryOther {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(anyhow!("inference failed"));
            }
            Ok(DetectionResult::new(vec![BoundingBox::person(
                0.0, 0.0, 10.0, 10.0, 0.9,
            )]))
        }
    }

    #[test]
    fn missing_video_yields_empty_result() {
        let mut detector = CpuBackend::new();
        let result = process_video(
            "/nonexistent/occupancy/video.mp4",
            &mut detector,
            &ProcessOptions::default(),
        );
        assert_eq!(result, ProcessResult::empty());
    }

    #[test]
    fn synthetic_video_is_fully_processed() {
        let mut detector = CpuBackend::new();
        let result = process_video(
            "stub://scene?frames=45&fps=15&width=160&height=120&people=1",
            &mut detector,
            &ProcessOptions::default(),
        );
        assert_eq!(result.frame_count, 45);
        assert_eq!(result.fps, 15.0);
        assert_eq!(result.frame_shape, (120, 160));
        assert!(result.detections_per_frame.iter().all(|f| f.len() == 1));
        assert_eq!(result.all_points().len(), 45);
    }

    #[test]
    fn progress_reports_every_frame() {
        let mut detector = CpuBackend::new();
        let mut seen = Vec::new();
        process_video_with_progress(
            "stub://scene?frames=5",
            &mut detector,
            &ProcessOptions::default(),
            &mut |done, hint| seen.push((done, hint)),
        );
        let done: Vec<u64> = seen.iter().map(|(d, _)| *d).collect();
        assert_eq!(done, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn unbuildable_detector_yields_empty_result() {
        let settings = DetectorSettings {
            backend: "opencv".to_string(),
            ..DetectorSettings::default()
        };
        let result = process_video_with_settings(
            "stub://scene?frames=5",
            &settings,
            &ProcessOptions::default(),
            &mut |_, _| {},
        );
        assert_eq!(result, ProcessResult::empty());
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn tract_without_the_feature_yields_empty_result() {
        let settings = DetectorSettings {
            backend: "tract".to_string(),
            ..DetectorSettings::default()
        };
        let result = process_video_with_settings(
            "stub://scene?frames=5",
            &settings,
            &ProcessOptions::default(),
            &mut |_, _| {},
        );
        assert_eq!(result, ProcessResult::empty());
    }

    #[test]
    fn zero_reported_fps_falls_back_to_thirty() {
        let mut detector = CpuBackend::new();
        let result = process_video(
            "stub://scene?frames=3&fps=0",
            &mut detector,
            &ProcessOptions::default(),
        );
        assert_eq!(result.fps, crate::DEFAULT_FPS);
    }

    #[test]
    fn detector_errors_count_as_empty_frames() {
        let mut detector = FailingEveryOther { calls: 0 };
        let result = process_video(
            "stub://scene?frames=4",
            &mut detector,
            &ProcessOptions::default(),
        );
        let counts: Vec<usize> = result.detections_per_frame.iter().map(Vec::len).collect();
        assert_eq!(counts, vec![1, 0, 1, 0]);
        assert_eq!(result.frame_count, 4);
    }
}
