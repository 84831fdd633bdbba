use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::heatmap::HeatmapOptions;
use crate::pipeline::ProcessOptions;

const DEFAULT_VIDEO_PATH: &str = "data/input/timelapse1.mp4";
const DEFAULT_OUTPUT_DIR: &str = "data/output";
#[cfg(feature = "backend-tract")]
const DEFAULT_BACKEND: &str = "tract";
#[cfg(not(feature = "backend-tract"))]
const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.7;
const DEFAULT_SIGMA: f32 = 25.0;
const DEFAULT_PROGRESS_FRAMES: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct MapperConfigFile {
    video_path: Option<String>,
    output_dir: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    heatmap: Option<HeatmapConfigFile>,
    progress: Option<ProgressConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct HeatmapConfigFile {
    sigma: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ProgressConfigFile {
    interval_frames: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub video_path: String,
    pub output_dir: PathBuf,
    pub detector: DetectorSettings,
    pub heatmap: HeatmapOptions,
    pub progress_interval: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    /// `tract` (YOLOv8 ONNX) or `cpu` (bright-blob detector). Defaults to
    /// `tract` only when that backend is compiled in.
    pub backend: String,
    pub model_path: PathBuf,
    /// Square model input side in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            video_path: DEFAULT_VIDEO_PATH.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            detector: DetectorSettings::default(),
            heatmap: HeatmapOptions {
                sigma: DEFAULT_SIGMA,
            },
            progress_interval: DEFAULT_PROGRESS_FRAMES,
        }
    }
}

impl MapperConfig {
    /// Defaults, then the file named by `OCCUPANCY_CONFIG`, then `OCCUPANCY_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OCCUPANCY_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like [`MapperConfig::load`] with an explicit config file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let file_cfg = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MapperConfigFile) -> Self {
        let defaults = Self::default();
        let detector = file.detector.unwrap_or_default();
        Self {
            video_path: file.video_path.unwrap_or(defaults.video_path),
            output_dir: file.output_dir.unwrap_or(defaults.output_dir),
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(defaults.detector.backend),
                model_path: detector.model_path.unwrap_or(defaults.detector.model_path),
                input_size: detector.input_size.unwrap_or(defaults.detector.input_size),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
            },
            heatmap: HeatmapOptions {
                sigma: file
                    .heatmap
                    .and_then(|heatmap| heatmap.sigma)
                    .unwrap_or(defaults.heatmap.sigma),
            },
            progress_interval: file
                .progress
                .and_then(|progress| progress.interval_frames)
                .unwrap_or(defaults.progress_interval),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(video) = std::env::var("OCCUPANCY_VIDEO") {
            if !video.trim().is_empty() {
                self.video_path = video;
            }
        }
        if let Ok(dir) = std::env::var("OCCUPANCY_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(backend) = std::env::var("OCCUPANCY_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("OCCUPANCY_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        if let Ok(confidence) = std::env::var("OCCUPANCY_CONFIDENCE") {
            self.detector.confidence_threshold = confidence.trim().parse().map_err(|_| {
                anyhow!("OCCUPANCY_CONFIDENCE must be a number between 0 and 1")
            })?;
        }
        if let Ok(frames) = std::env::var("OCCUPANCY_PROGRESS_FRAMES") {
            self.progress_interval = frames.trim().parse().map_err(|_| {
                anyhow!("OCCUPANCY_PROGRESS_FRAMES must be a whole number of frames")
            })?;
        }
        Ok(())
    }

    /// Check value ranges. Call again after applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.video_path.trim().is_empty() {
            return Err(anyhow!("video path must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output directory must not be empty"));
        }
        let d = &self.detector;
        if !(d.confidence_threshold > 0.0 && d.confidence_threshold <= 1.0) {
            return Err(anyhow!("confidence threshold must be in (0, 1]"));
        }
        if !(d.iou_threshold > 0.0 && d.iou_threshold <= 1.0) {
            return Err(anyhow!("iou threshold must be in (0, 1]"));
        }
        if d.input_size == 0 || d.input_size % 32 != 0 {
            return Err(anyhow!(
                "detector input size must be a positive multiple of 32"
            ));
        }
        if !(self.heatmap.sigma > 0.0 && self.heatmap.sigma.is_finite()) {
            return Err(anyhow!("heatmap sigma must be greater than zero"));
        }
        if self.progress_interval == 0 {
            return Err(anyhow!("progress interval must be greater than zero"));
        }
        Ok(())
    }

    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            progress_interval: self.progress_interval,
        }
    }
}

fn read_config_file(path: &Path) -> Result<MapperConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MapperConfig {
        MapperConfig::default()
    }

    #[test]
    fn defaults_are_valid() -> Result<()> {
        valid().validate()
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = valid();
        cfg.detector.confidence_threshold = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.detector.iou_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.detector.input_size = 600;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.heatmap.sigma = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.progress_interval = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid();
        cfg.video_path = " ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_backend_is_always_buildable() -> Result<()> {
        let settings = DetectorSettings::default();
        if cfg!(feature = "backend-tract") {
            assert_eq!(settings.backend, "tract");
        } else {
            assert_eq!(settings.backend, "cpu");
            crate::build_backend(&settings)?;
        }
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let file: MapperConfigFile =
            serde_json::from_str(r#"{"detector": {"backend": "tract"}}"#)?;
        let cfg = MapperConfig::from_file(file);
        assert_eq!(cfg.detector.backend, "tract");
        assert_eq!(cfg.detector.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(cfg.video_path, DEFAULT_VIDEO_PATH);
        assert_eq!(cfg.progress_interval, DEFAULT_PROGRESS_FRAMES);
        Ok(())
    }
}
