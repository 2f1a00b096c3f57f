//! Types for narration timing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TimingSettings;

/// One spoken word with its timing in the narration audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    /// Seconds from the start of the narration.
    pub start: f64,
    pub end: f64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

/// Character-level alignment as returned by speech services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAlignment {
    pub characters: Vec<String>,
    pub character_start_times_seconds: Vec<f64>,
    pub character_end_times_seconds: Vec<f64>,
}

/// A span of narration that drives one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationSegment {
    /// Position in narration order (0-based).
    pub index: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl NarrationSegment {
    pub fn new(index: usize, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            index,
            text: text.into(),
            start,
            end,
        }
    }

    /// Length of the segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Tunables for word grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    pub pause_threshold: f64,
    pub min_fragment: f64,
    pub clause_breaks: bool,
    pub close_gaps: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from_settings(&TimingSettings::default())
    }
}

impl SegmenterConfig {
    pub fn from_settings(settings: &TimingSettings) -> Self {
        Self {
            pause_threshold: settings.pause_threshold,
            min_fragment: settings.min_fragment,
            clause_breaks: settings.clause_breaks,
            close_gaps: settings.close_gaps,
        }
    }
}

/// Everything a segmentation strategy may use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrationInput {
    /// Word timings, when the speech service returned alignment.
    #[serde(default)]
    pub words: Option<Vec<WordTiming>>,
    /// Length of the narration audio in seconds.
    pub total_duration: f64,
    /// Declared per-scene narration text (also fixes the fallback scene count).
    #[serde(default)]
    pub scene_texts: Vec<String>,
}

/// Errors from the timing model.
#[derive(Debug, Error)]
pub enum TimingError {
    /// Alignment data is missing or malformed.
    #[error("Alignment unavailable: {0}")]
    AlignmentUnavailable(String),

    /// Uniform fallback needs at least one scene.
    #[error("Scene count must be positive")]
    NoScenes,

    /// Narration duration is zero, negative or not a number.
    #[error("Invalid narration duration: {0}")]
    InvalidDuration(f64),
}

/// Type alias for timing results.
pub type TimingResult<T> = Result<T, TimingError>;
