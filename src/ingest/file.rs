//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file. The source:
//! - Opens only local paths (no URL schemes besides `stub://`)
//! - Decodes frames in-memory to RGB24
//! - Numbers frames from 1 in decode order
//!
//! `stub://` paths select a synthetic scene instead of a decoder.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::SyntheticFileSource;
use super::VideoInfo;
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "data/input/timelapse1.mp4") or `stub://...`.
    pub path: String,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
    frames_read: u64,
    path: String,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(Box<FfmpegFileSource>),
}

impl FileSource {
    /// Open the source. Fails when the path is not local, the file cannot be
    /// opened, or it has no video track.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let backend = if config.path.starts_with("stub://") {
            FileBackend::Synthetic(SyntheticFileSource::parse(&config.path)?)
        } else {
            open_decoder(&config)?
        };
        log::info!("FileSource: opened {}", config.path);
        Ok(Self {
            backend,
            frames_read: 0,
            path: config.path,
        })
    }

    /// Stream properties known at open time.
    pub fn info(&self) -> VideoInfo {
        match &self.backend {
            FileBackend::Synthetic(source) => source.info(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.info(),
        }
    }

    /// Decode the next frame, or `None` at end of stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let index = self.frames_read + 1;
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(index)?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(index)?,
        };
        if frame.is_some() {
            self.frames_read = index;
        }
        Ok(frame)
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        FileStats {
            frames_read: self.frames_read,
            path: self.path.clone(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_read: u64,
    pub path: String,
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_decoder(config: &FileConfig) -> Result<FileBackend> {
    Ok(FileBackend::Ffmpeg(Box::new(FfmpegFileSource::new(
        config,
    )?)))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_decoder(_config: &FileConfig) -> Result<FileBackend> {
    Err(anyhow!(
        "file ingestion requires the ingest-file-ffmpeg feature"
    ))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
