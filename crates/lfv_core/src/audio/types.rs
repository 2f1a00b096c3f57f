//! Types for audio mixing.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AudioRole;

/// An audio file entering or leaving the mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub role: AudioRole,
    pub sample_rate: u32,
    pub channels: u16,
    /// Linear gain applied in the mix.
    pub relative_level: f64,
}

impl AudioTrack {
    /// A track whose format is not yet known (filled in on decode).
    pub fn new(path: impl Into<PathBuf>, role: AudioRole, relative_level: f64) -> Self {
        Self {
            path: path.into(),
            role,
            sample_rate: 0,
            channels: 0,
            relative_level,
        }
    }
}

/// Interleaved 32-bit float PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Silent buffer of `frames` frames.
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Number of sample frames.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / f64::from(self.sample_rate)
        }
    }
}

/// Peak and loudness summary of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelReport {
    /// Largest absolute sample after clamping.
    pub peak: f32,
    pub peak_dbfs: f64,
    pub rms_dbfs: f64,
    /// Samples that exceeded full scale before clamping.
    pub clipped_samples: usize,
}

/// Result of a mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixOutput {
    /// The written mix, role `Mixed`.
    pub track: AudioTrack,
    pub duration: f64,
    pub levels: LevelReport,
}

/// Errors from audio mixing.
#[derive(Debug, Error)]
pub enum MixError {
    /// A track could not be brought to the common rate and layout.
    #[error("Track {index} ({role}) could not be brought to the mix format: {reason}")]
    SampleRateMismatchUnresolved {
        index: usize,
        role: AudioRole,
        reason: String,
    },

    /// No track carries the reference role.
    #[error("No {0} track to use as mix reference")]
    NoReferenceTrack(AudioRole),

    /// PCM data is inconsistent with its declared format.
    #[error("Invalid PCM buffer: {0}")]
    InvalidBuffer(String),

    /// Decoding a file failed.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Type alias for mixing results.
pub type MixResult<T> = Result<T, MixError>;
