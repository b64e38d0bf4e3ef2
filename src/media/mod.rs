// Media capabilities used by the frame sampler
//
// - Decoder: opens a source, reports its duration and seeks to timestamps
// - Encoder: turns the current decoded frame into a compressed still
// - Commands: ffmpeg/ffprobe command builders

pub mod commands;
pub mod ffmpeg;
pub mod jpeg;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::{Path, PathBuf};

pub use commands::*;
pub use ffmpeg::FfmpegDecoder;
pub use jpeg::JpegEncoder;

use crate::config::MediaConfig;
use crate::error::{Result, VidioError};

/// Extensions accepted as video input
pub const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];

/// Video data handed to a decoder
#[derive(Debug, Clone)]
pub enum VideoSource {
    File(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl VideoSource {
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        VideoSource::File(path.as_ref().to_path_buf())
    }

    /// Display name, used for project history
    pub fn name(&self) -> String {
        match self {
            VideoSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            VideoSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Reject inputs that do not look like video files
    pub fn validate_video(&self) -> Result<()> {
        let name = self.name();
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(VidioError::InvalidArgument(format!(
                    "Please select a valid video file ({})",
                    name
                )))
            }
        }

        if let VideoSource::File(path) = self {
            if !path.is_file() {
                return Err(VidioError::InvalidArgument(format!(
                    "Video file not found: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Metadata reported when a source is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// A decoded frame as packed RGB24 pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// An encoded still image
#[derive(Debug, Clone, PartialEq)]
pub struct StillImage {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl StillImage {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Loads a video, reports its duration and exposes one current frame at a time
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// Open a source and read its metadata
    async fn open(&mut self, source: &VideoSource) -> Result<MediaInfo>;

    /// Seek to `timestamp` seconds; returns once that frame is readable
    async fn seek_to(&mut self, timestamp: f64) -> Result<()>;

    /// The frame produced by the last successful seek
    fn current_frame(&self) -> Result<&RawFrame>;

    /// Release everything acquired by `open`
    async fn close(&mut self);
}

/// Rasterizes a decoded frame into a compressed still image
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<StillImage>;
}

/// Factory for the default ffmpeg/JPEG media stack
pub struct MediaFactory;

impl MediaFactory {
    pub fn create_decoder(config: MediaConfig) -> Box<dyn MediaDecoder> {
        Box::new(FfmpegDecoder::new(config))
    }

    pub fn create_encoder() -> Box<dyn FrameEncoder> {
        Box::new(JpegEncoder)
    }

    /// Check that ffmpeg and ffprobe can be executed
    pub async fn check_availability(config: &MediaConfig) -> Result<()> {
        let builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
        for command in builder.version_checks() {
            command.execute().await?;
        }
        Ok(())
    }
}
