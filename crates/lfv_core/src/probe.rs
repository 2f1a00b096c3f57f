//! Media probing through ffprobe.
//!
//! Reads container duration, the first audio stream's format and the
//! first video stream's dimensions.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from probing media.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("ffprobe failed on {path}: {message}")]
    ToolFailed { path: String, message: String },

    #[error("Failed to parse ffprobe output for {what}: {message}")]
    Parse { what: String, message: String },

    #[error("{0} has no {1} stream")]
    NoStream(String, &'static str),
}

/// Type alias for probe results.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Format of an audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default)]
    pub codec_name: String,
}

#[derive(Deserialize)]
struct StreamList<T> {
    #[serde(default = "Vec::new")]
    streams: Vec<T>,
}

#[derive(Deserialize)]
struct RawAudioStream {
    sample_rate: Option<String>,
    channels: Option<u16>,
    codec_name: Option<String>,
}

#[derive(Deserialize)]
struct RawVideoStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// ffprobe wrapper.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe: String,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    /// Container duration in seconds.
    pub fn duration(&self, path: &Path) -> ProbeResult<f64> {
        let stdout = self.run(
            path,
            &[
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;
        parse_duration(&stdout)
    }

    /// Format of the first audio stream.
    pub fn audio_stream(&self, path: &Path) -> ProbeResult<AudioStreamInfo> {
        let stdout = self.run(
            path,
            &[
                "-select_streams",
                "a:0",
                "-show_entries",
                "stream=sample_rate,channels,codec_name",
                "-of",
                "json",
            ],
        )?;
        parse_audio_stream(&stdout).map_err(|e| match e {
            ProbeError::NoStream(_, kind) => ProbeError::NoStream(path.display().to_string(), kind),
            other => other,
        })
    }

    /// Width and height of the first video stream.
    pub fn video_dimensions(&self, path: &Path) -> ProbeResult<(u32, u32)> {
        let stdout = self.run(
            path,
            &[
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "json",
            ],
        )?;
        parse_dimensions(&stdout).map_err(|e| match e {
            ProbeError::NoStream(_, kind) => ProbeError::NoStream(path.display().to_string(), kind),
            other => other,
        })
    }

    fn run(&self, path: &Path, args: &[&str]) -> ProbeResult<String> {
        if !path.exists() {
            return Err(ProbeError::SourceNotFound(path.display().to_string()));
        }

        let mut cmd = Command::new(&self.ffprobe);
        cmd.arg("-v").arg("error").args(args).arg(path);
        tracing::debug!("Running ffprobe: {:?}", cmd);

        let output = cmd.output().map_err(|e| ProbeError::ToolFailed {
            path: path.display().to_string(),
            message: format!("failed to run {}: {}", self.ffprobe, e),
        })?;

        if !output.status.success() {
            return Err(ProbeError::ToolFailed {
                path: path.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse `format=duration` output.
pub fn parse_duration(stdout: &str) -> ProbeResult<f64> {
    let value = stdout.trim();
    let duration = value.parse::<f64>().map_err(|e| ProbeError::Parse {
        what: "duration".to_string(),
        message: format!("'{}': {}", value, e),
    })?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(ProbeError::Parse {
            what: "duration".to_string(),
            message: format!("'{}' is not a valid duration", value),
        });
    }
    Ok(duration)
}

/// Parse the JSON stream list for an audio stream.
pub fn parse_audio_stream(stdout: &str) -> ProbeResult<AudioStreamInfo> {
    let list: StreamList<RawAudioStream> = serde_json::from_str(stdout).map_err(|e| {
        ProbeError::Parse {
            what: "audio stream".to_string(),
            message: e.to_string(),
        }
    })?;
    let stream = list
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::NoStream(String::new(), "audio"))?;

    let sample_rate = stream
        .sample_rate
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|r| *r > 0)
        .ok_or_else(|| ProbeError::Parse {
            what: "sample_rate".to_string(),
            message: format!("{:?}", stream.sample_rate),
        })?;
    let channels = stream.channels.filter(|c| *c > 0).ok_or_else(|| ProbeError::Parse {
        what: "channels".to_string(),
        message: format!("{:?}", stream.channels),
    })?;

    Ok(AudioStreamInfo {
        sample_rate,
        channels,
        codec_name: stream.codec_name.unwrap_or_default(),
    })
}

/// Parse the JSON stream list for video dimensions.
pub fn parse_dimensions(stdout: &str) -> ProbeResult<(u32, u32)> {
    let list: StreamList<RawVideoStream> = serde_json::from_str(stdout).map_err(|e| {
        ProbeError::Parse {
            what: "video stream".to_string(),
            message: e.to_string(),
        }
    })?;
    let stream = list
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::NoStream(String::new(), "video"))?;

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        (w, h) => Err(ProbeError::Parse {
            what: "dimensions".to_string(),
            message: format!("{:?}x{:?}", w, h),
        }),
    }
}
