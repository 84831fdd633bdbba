//! Report artifacts.
//!
//! All file output goes through a [`ReportSink`], so the processing and
//! aggregation stages never touch the filesystem themselves. The text
//! formats are produced by the pure `*_csv`/`stats_json` helpers and shared
//! by every sink.

use anyhow::{Context, Result};
use image::RgbImage;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::stats::OccupancyStats;
use crate::Point;

pub const DETECTIONS_CSV: &str = "detections.csv";
pub const STATS_JSON: &str = "stats.json";
pub const STATS_SUMMARY_CSV: &str = "stats_summary.csv";
pub const HEATMAP_PNG: &str = "heatmap.png";

pub trait ReportSink {
    /// Persist every detection, one row per (frame, person).
    fn write_detections(&mut self, frames: &[Vec<Point>]) -> Result<()>;

    /// Persist the statistics record and its scalar summary.
    fn write_stats(&mut self, stats: &OccupancyStats) -> Result<()>;

    /// Persist the rendered heatmap.
    fn write_heatmap(&mut self, heatmap: &RgbImage) -> Result<()>;
}

/// `frame_idx,x,y` rows with 1-based frame numbers.
pub fn detections_csv(frames: &[Vec<Point>]) -> String {
    let mut out = String::from("frame_idx,x,y\n");
    for (idx, points) in frames.iter().enumerate() {
        for p in points {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{},{},{}", idx + 1, p.x, p.y);
        }
    }
    out
}

/// Pretty-printed JSON record.
pub fn stats_json(stats: &OccupancyStats) -> Result<String> {
    serde_json::to_string_pretty(stats).context("serialize occupancy stats")
}

/// `metric,value` rows for the scalar metrics.
pub fn summary_csv(stats: &OccupancyStats) -> String {
    let mut out = String::from("metric,value\n");
    for (metric, value) in stats.summary_rows() {
        let _ = writeln!(out, "{},{}", metric, value);
    }
    out
}

/// Writes artifacts into a local output directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn detections_path(&self) -> PathBuf {
        self.dir.join(DETECTIONS_CSV)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.dir.join(STATS_JSON)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(STATS_SUMMARY_CSV)
    }

    pub fn heatmap_path(&self) -> PathBuf {
        self.dir.join(HEATMAP_PNG)
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }
}

impl ReportSink for DirectorySink {
    fn write_detections(&mut self, frames: &[Vec<Point>]) -> Result<()> {
        self.write_text(&self.detections_path(), &detections_csv(frames))
    }

    fn write_stats(&mut self, stats: &OccupancyStats) -> Result<()> {
        self.write_text(&self.stats_path(), &stats_json(stats)?)?;
        self.write_text(&self.summary_path(), &summary_csv(stats))
    }

    fn write_heatmap(&mut self, heatmap: &RgbImage) -> Result<()> {
        let path = self.heatmap_path();
        heatmap
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// Keeps rendered artifacts in memory.
#[derive(Default)]
pub struct MemorySink {
    pub detections_csv: Option<String>,
    pub stats_json: Option<String>,
    pub summary_csv: Option<String>,
    pub heatmap: Option<RgbImage>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn write_detections(&mut self, frames: &[Vec<Point>]) -> Result<()> {
        self.detections_csv = Some(detections_csv(frames));
        Ok(())
    }

    fn write_stats(&mut self, stats: &OccupancyStats) -> Result<()> {
        self.stats_json = Some(stats_json(stats)?);
        self.summary_csv = Some(summary_csv(stats));
        Ok(())
    }

    fn write_heatmap(&mut self, heatmap: &RgbImage) -> Result<()> {
        self.heatmap = Some(heatmap.clone());
        Ok(())
    }
}
