//! Occupancy aggregation.
//!
//! `compute_stats` folds a per-frame detection list into an
//! [`OccupancyStats`] record. It is pure: no I/O, no clock, no randomness,
//! and every division is guarded, so it never fails.

use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessResult;
use crate::Point;

/// Longest `people_per_second` series kept (about twelve days of video).
pub const MAX_SERIES_SECONDS: usize = 1 << 20;

/// Summary statistics for one processed video.
///
/// Field order is also the key order of `stats.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyStats {
    pub total_frames: u64,
    pub fps: f64,
    pub duration_seconds: f64,
    /// Person-frames: sum of per-frame detection counts.
    pub total_detections: u64,
    pub frames_with_detections: u64,
    pub average_people_per_frame: f64,
    pub average_people_when_occupied: f64,
    pub peak_people_in_single_frame: u64,
    pub estimated_person_seconds: f64,
    /// Detections per whole second of video.
    pub people_per_second: Vec<u64>,
}

/// Aggregate per-frame detections.
///
/// `frames[i]` holds the detections of the frame at 0-based index `i`.
/// `frame_count` is the number of frames the video yielded and `fps` its
/// frame rate; `fps <= 0` (or non-finite) is degenerate and yields a zero
/// duration and an empty per-second series.
///
/// Frame `i` contributes to `people_per_second[floor(i / fps)]`. A frame
/// whose second index falls past the end of the series is dropped from it,
/// so the series may sum to less than `total_detections`. The series is
/// capped at [`MAX_SERIES_SECONDS`] entries; a tiny positive `fps` would
/// otherwise ask for an unbounded allocation.
pub fn compute_stats(frames: &[Vec<Point>], frame_count: u64, fps: f64) -> OccupancyStats {
    let usable_fps = fps.is_finite() && fps > 0.0;

    let total_detections: u64 = frames.iter().map(|f| f.len() as u64).sum();
    let frames_with_detections = frames.iter().filter(|f| !f.is_empty()).count() as u64;
    let peak = frames.iter().map(|f| f.len() as u64).max().unwrap_or(0);

    let average_people_per_frame = ratio(total_detections, frame_count);
    let average_people_when_occupied = ratio(total_detections, frames_with_detections);

    let (duration_seconds, estimated_person_seconds) = if usable_fps {
        (
            frame_count as f64 / fps,
            total_detections as f64 / fps,
        )
    } else {
        (0.0, 0.0)
    };

    let seconds = if duration_seconds > 0.0 {
        (duration_seconds.ceil() as usize).min(MAX_SERIES_SECONDS)
    } else {
        0
    };
    let mut people_per_second = vec![0u64; seconds];
    if seconds > 0 {
        for (idx, detections) in frames.iter().enumerate() {
            let second_index = (idx as f64 / fps).floor() as usize;
            if let Some(slot) = people_per_second.get_mut(second_index) {
                *slot += detections.len() as u64;
            }
        }
    }

    OccupancyStats {
        total_frames: frame_count,
        fps,
        duration_seconds,
        total_detections,
        frames_with_detections,
        average_people_per_frame,
        average_people_when_occupied,
        peak_people_in_single_frame: peak,
        estimated_person_seconds,
        people_per_second,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

impl OccupancyStats {
    /// Aggregate the output of [`crate::pipeline::process_video`].
    pub fn from_result(result: &ProcessResult) -> Self {
        compute_stats(&result.detections_per_frame, result.frame_count, result.fps)
    }

    /// Scalar metrics in report order (the per-second series is excluded).
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("total_frames", self.total_frames.to_string()),
            ("fps", format_float(self.fps)),
            ("duration_seconds", format_float(self.duration_seconds)),
            ("total_detections", self.total_detections.to_string()),
            (
                "frames_with_detections",
                self.frames_with_detections.to_string(),
            ),
            (
                "average_people_per_frame",
                format_float(self.average_people_per_frame),
            ),
            (
                "average_people_when_occupied",
                format_float(self.average_people_when_occupied),
            ),
            (
                "peak_people_in_single_frame",
                self.peak_people_in_single_frame.to_string(),
            ),
            (
                "estimated_person_seconds",
                format_float(self.estimated_person_seconds),
            ),
        ]
    }
}

// Shortest round-trip form that always keeps a decimal point ("3.0", "0.1").
fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(counts: &[usize]) -> Vec<Vec<Point>> {
        counts
            .iter()
            .map(|&n| (0..n as i32).map(|i| Point::new(i, i)).collect())
            .collect()
    }

    #[test]
    fn empty_input_yields_zero_record() {
        let stats = compute_stats(&[], 0, 30.0);
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.duration_seconds, 0.0);
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.frames_with_detections, 0);
        assert_eq!(stats.average_people_per_frame, 0.0);
        assert_eq!(stats.average_people_when_occupied, 0.0);
        assert_eq!(stats.peak_people_in_single_frame, 0);
        assert_eq!(stats.estimated_person_seconds, 0.0);
        assert!(stats.people_per_second.is_empty());
    }

    #[test]
    fn three_frame_scenario() {
        let input = vec![
            vec![],
            vec![Point::new(1, 1)],
            vec![Point::new(2, 2), Point::new(3, 3)],
        ];
        let stats = compute_stats(&input, 3, 30.0);
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.frames_with_detections, 2);
        assert_eq!(stats.peak_people_in_single_frame, 2);
        assert_eq!(stats.average_people_per_frame, 1.0);
        assert_eq!(stats.average_people_when_occupied, 1.5);
        assert_eq!(stats.estimated_person_seconds, 0.1);
        assert_eq!(stats.people_per_second, vec![3]);
    }

    #[test]
    fn ninety_frames_at_thirty_fps_is_three_seconds() {
        let counts: Vec<usize> = (0..90).map(|i| i / 30 + 1).collect();
        let stats = compute_stats(&frames(&counts), 90, 30.0);
        assert_eq!(stats.duration_seconds, 3.0);
        assert_eq!(stats.people_per_second, vec![30, 60, 90]);
        assert_eq!(
            stats.people_per_second.iter().sum::<u64>(),
            stats.total_detections
        );
    }

    #[test]
    fn zero_fps_is_degenerate() {
        let stats = compute_stats(&frames(&[2, 1, 0]), 3, 0.0);
        assert_eq!(stats.duration_seconds, 0.0);
        assert_eq!(stats.estimated_person_seconds, 0.0);
        assert!(stats.people_per_second.is_empty());
        assert_eq!(stats.total_detections, 3);
        assert_eq!(stats.average_people_per_frame, 1.0);
    }

    #[test]
    fn negative_and_nan_fps_are_degenerate() {
        for fps in [-30.0, f64::NAN, f64::INFINITY] {
            let stats = compute_stats(&frames(&[1]), 1, fps);
            assert_eq!(stats.duration_seconds, 0.0);
            assert_eq!(stats.estimated_person_seconds, 0.0);
            assert!(stats.people_per_second.is_empty());
        }
    }

    #[test]
    fn series_length_is_ceiling_of_duration() {
        let stats = compute_stats(&frames(&[1; 31]), 31, 30.0);
        assert_eq!(stats.people_per_second.len(), 2);
        assert_eq!(stats.people_per_second, vec![30, 1]);
    }

    #[test]
    fn frames_past_the_series_end_are_dropped() {
        // More frames than frame_count claims: frame 30 maps to second 1,
        // but the series only has one slot.
        let stats = compute_stats(&frames(&[1; 31]), 30, 30.0);
        assert_eq!(stats.people_per_second, vec![30]);
        assert_eq!(stats.total_detections, 31);
    }

    #[test]
    fn tiny_fps_caps_the_series() {
        let frames = vec![vec![Point::new(1, 1)], vec![Point::new(2, 2)]];
        let stats = compute_stats(&frames, 2, 1e-300);
        assert_eq!(stats.people_per_second.len(), MAX_SERIES_SECONDS);
        assert_eq!(stats.people_per_second[0], 1);
        assert_eq!(stats.people_per_second.iter().sum::<u64>(), 1);
        assert!(stats.duration_seconds > MAX_SERIES_SECONDS as f64);

        let empty = compute_stats(&[], 1, 1e-300);
        assert_eq!(empty.people_per_second.len(), MAX_SERIES_SECONDS);
    }

    #[test]
    fn fractional_fps_buckets_by_floor() {
        // 5 frames at 2.5 fps: offsets 0, 0.4, 0.8, 1.2, 1.6 seconds.
        let stats = compute_stats(&frames(&[1; 5]), 5, 2.5);
        assert_eq!(stats.duration_seconds, 2.0);
        assert_eq!(stats.people_per_second, vec![3, 2]);

        let stats = compute_stats(&frames(&[1; 3]), 3, 1.5);
        assert_eq!(stats.people_per_second, vec![2, 1]);
    }

    #[test]
    fn invariants_hold_for_varied_inputs() {
        let cases: [&[usize]; 4] = [&[], &[0, 0, 0], &[5, 0, 2, 7, 1], &[1; 100]];
        for counts in cases {
            let input = frames(counts);
            let stats = compute_stats(&input, counts.len() as u64, 24.0);
            let expected_total: usize = counts.iter().sum();
            assert_eq!(stats.total_detections, expected_total as u64);
            assert!(stats.frames_with_detections <= stats.total_frames);
            assert_eq!(
                stats.peak_people_in_single_frame,
                counts.iter().copied().max().unwrap_or(0) as u64
            );
            assert_eq!(
                stats.people_per_second.len(),
                stats.duration_seconds.ceil() as usize
            );
        }
    }

    #[test]
    fn aggregation_is_deterministic() -> anyhow::Result<()> {
        let input = frames(&[3, 0, 1, 4]);
        let first = compute_stats(&input, 4, 30.0);
        let second = compute_stats(&input, 4, 30.0);
        assert_eq!(first, second);
        assert_eq!(serde_json::to_vec(&first)?, serde_json::to_vec(&second)?);
        Ok(())
    }

    #[test]
    fn summary_rows_cover_scalar_metrics_in_order() {
        let stats = compute_stats(&frames(&[0, 1, 2]), 3, 30.0);
        let rows = stats.summary_rows();
        let names: Vec<&str> = rows.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "total_frames",
                "fps",
                "duration_seconds",
                "total_detections",
                "frames_with_detections",
                "average_people_per_frame",
                "average_people_when_occupied",
                "peak_people_in_single_frame",
                "estimated_person_seconds",
            ]
        );
        assert_eq!(rows[0].1, "3");
        assert_eq!(rows[1].1, "30.0");
        assert_eq!(rows[5].1, "1.0");
        assert_eq!(rows[6].1, "1.5");
    }
}
