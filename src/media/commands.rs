use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, VidioError};

/// A single ffmpeg/ffprobe invocation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }


    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Select which input stream is decoded (must follow `input`)
    pub fn map_stream<S: Into<String>>(self, specifier: S) -> Self {
        self.arg("-map").arg(specifier)
    }

    /// Seek the input before decoding (must precede `input`)
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.6}", seconds))
    }

    /// Stop after this many video frames
    pub fn frames(self, count: u32) -> Self {
        self.arg("-frames:v").arg(count.to_string())
    }

    /// Set output container format
    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Set output pixel format
    pub fn pixel_format<S: Into<String>>(self, pix_fmt: S) -> Self {
        self.arg("-pix_fmt").arg(pix_fmt)
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-v").arg("error")
    }

    /// Write output to stdout
    pub fn to_stdout(self) -> Self {
        self.arg("pipe:1")
    }

    async fn run(&self) -> Result<std::process::Output> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VidioError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidioError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(output)
    }

    /// Execute the command, discarding its output
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return everything it wrote to stdout
    pub async fn execute_capture(&self) -> Result<Vec<u8>> {
        Ok(self.run().await?.stdout)
    }
}

/// Dimensions and rotation of the first video stream plus container duration
const PROBE_ENTRIES: &str =
    "stream=width,height:stream_tags=rotate:stream_side_data=rotation:format=duration";

/// Builder for the ffmpeg/ffprobe invocations used by the decoder
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe duration and first video stream dimensions as JSON
    pub fn probe<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Media probe")
            .quiet()
            .arg("-select_streams").arg("v:0")
            .arg("-show_entries").arg(PROBE_ENTRIES)
            .arg("-of").arg("json")
            .arg(video_path.as_ref().to_string_lossy().to_string())
    }

    /// Decode the single frame at `timestamp` as packed RGB24 on stdout
    pub fn grab_frame<P: AsRef<Path>>(&self, video_path: P, timestamp: f64) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, format!("Frame grab at {:.3}s", timestamp))
            .quiet()
            .seek(timestamp)
            .input(video_path)
            .map_stream("0:v:0")
            .no_audio()
            .frames(1)
            .format("rawvideo")
            .pixel_format("rgb24")
            .to_stdout()
    }

    /// Version checks for both binaries
    pub fn version_checks(&self) -> [MediaCommand; 2] {
        [
            MediaCommand::new(&self.ffmpeg_path, "ffmpeg version check").arg("-version"),
            MediaCommand::new(&self.ffprobe_path, "ffprobe version check").arg("-version"),
        ]
    }
}
