use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, VidioError};
use super::{MediaCommandBuilder, MediaDecoder, MediaInfo, RawFrame, VideoSource};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, normalised to `0..360`.
    ///
    /// The display matrix side data wins over the legacy `rotate` tag.
    fn rotation(&self) -> i64 {
        let degrees = self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse ffprobe JSON into duration and dimensions
pub(crate) fn parse_probe_output(json: &[u8]) -> Result<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| VidioError::Decode(format!("Unreadable probe output: {}", e)))?;

    let stream = probe.streams.first()
        .ok_or_else(|| VidioError::Decode("No video stream found".to_string()))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VidioError::Decode("Video stream has no dimensions".to_string())),
    };
    // ffmpeg applies the rotation when decoding, so report the displayed size
    let (width, height) = match stream.rotation() {
        90 | 270 => (height, width),
        _ => (width, height),
    };

    let duration = probe.format
        .and_then(|f| f.duration)
        .ok_or_else(|| VidioError::Decode("Duration unavailable".to_string()))?
        .trim()
        .parse::<f64>()
        .map_err(|e| VidioError::Decode(format!("Invalid duration: {}", e)))?;

    Ok(MediaInfo { duration, width, height })
}

/// A grabbed frame must be exactly one RGB24 image of the probed size
fn check_frame_len(len: usize, width: u32, height: u32) -> std::result::Result<(), String> {
    let expected = RawFrame::expected_len(width, height);
    if len != expected {
        return Err(format!(
            "Decoder produced {} bytes, expected {} for {}x{}",
            len, expected, width, height
        ));
    }
    Ok(())
}

/// Source currently attached to the decoder
struct OpenedSource {
    path: PathBuf,
    info: MediaInfo,
    // Deleted from disk when dropped
    _spill: Option<NamedTempFile>,
}

/// Decoder driving the ffprobe and ffmpeg binaries
pub struct FfmpegDecoder {
    commands: MediaCommandBuilder,
    opened: Option<OpenedSource>,
    current: Option<RawFrame>,
}

impl FfmpegDecoder {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            commands: MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path),
            opened: None,
            current: None,
        }
    }

    fn spill_to_disk(name: &str, data: &[u8]) -> Result<NamedTempFile> {
        let suffix = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("vidio-source-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| VidioError::Decode(format!("Failed to buffer video: {}", e)))?;
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| VidioError::Decode(format!("Failed to buffer video: {}", e)))?;
        Ok(file)
    }
}

#[async_trait]
impl MediaDecoder for FfmpegDecoder {
    async fn open(&mut self, source: &VideoSource) -> Result<MediaInfo> {
        self.close().await;

        let (path, spill) = match source {
            VideoSource::File(path) => (path.clone(), None),
            VideoSource::Bytes { name, data } => {
                let file = Self::spill_to_disk(name, data)?;
                debug!("Buffered {} bytes of {} to {}", data.len(), name, file.path().display());
                (file.path().to_path_buf(), Some(file))
            }
        };

        let output = self.commands.probe(&path).execute_capture().await
            .map_err(|e| VidioError::Decode(format!("Cannot open {}: {}", source.name(), e)))?;
        let info = parse_probe_output(&output)?;

        info!("Opened {} ({:.2}s, {}x{})", source.name(), info.duration, info.width, info.height);
        self.opened = Some(OpenedSource { path, info, _spill: spill });
        Ok(info)
    }

    async fn seek_to(&mut self, timestamp: f64) -> Result<()> {
        let opened = self.opened.as_ref()
            .ok_or_else(|| VidioError::Seek { timestamp, reason: "No source open".to_string() })?;
        let MediaInfo { width, height, .. } = opened.info;

        // Invalidate first so a failed seek never leaves a stale frame readable
        self.current = None;

        let data = self.commands.grab_frame(&opened.path, timestamp).execute_capture().await
            .map_err(|e| VidioError::Seek { timestamp, reason: e.to_string() })?;

        check_frame_len(data.len(), width, height)
            .map_err(|reason| VidioError::Seek { timestamp, reason })?;

        self.current = Some(RawFrame { width, height, data });
        Ok(())
    }

    fn current_frame(&self) -> Result<&RawFrame> {
        self.current.as_ref()
            .ok_or_else(|| VidioError::Media("No frame decoded yet".to_string()))
    }

    async fn close(&mut self) {
        self.current = None;
        if let Some(opened) = self.opened.take() {
            debug!("Released {}", opened.path.display());
        }
    }
}
