//! Types for clip fitting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SourceClip;

/// A source clip cut to the window it occupies on the timeline.
///
/// `target_duration == trim_end - trim_start` always holds. When the
/// source was too short, `target_duration < requested_duration` and the
/// difference is the deficit the timeline must absorb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedClip {
    pub source: SourceClip,
    /// Start of the kept window in source time.
    pub trim_start: f64,
    /// End of the kept window in source time.
    pub trim_end: f64,
    /// Seconds of footage this clip contributes.
    pub target_duration: f64,
    /// Seconds the narration segment asked for.
    pub requested_duration: f64,
}

impl FittedClip {
    /// Seconds of footage missing relative to the request.
    pub fn deficit(&self) -> f64 {
        (self.requested_duration - self.target_duration).max(0.0)
    }

    /// Whether the source could not cover the request.
    pub fn is_short(&self) -> bool {
        self.deficit() > 0.0
    }
}

/// All clips of a run after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub clips: Vec<FittedClip>,
    /// Sum of every clip's deficit.
    pub total_deficit: f64,
}

/// Errors from clip fitting.
#[derive(Debug, Error)]
pub enum FitError {
    /// A target or source is below the minimum clip duration.
    #[error("{}too short: {duration:.2}s is below the {minimum:.2}s minimum", describe_index(.index))]
    ClipTooShort {
        index: Option<usize>,
        duration: f64,
        minimum: f64,
    },

    /// Clip and segment lists differ in length.
    #[error("Count mismatch: {clips} clips for {segments} segments")]
    CountMismatch { clips: usize, segments: usize },

    /// A duration is zero, negative or not a number.
    #[error("{}has invalid duration {value}", describe_index(.index))]
    InvalidDuration { index: Option<usize>, value: f64 },
}

fn describe_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("Clip {} ", i),
        None => "Clip ".to_string(),
    }
}

impl FitError {
    /// Attach the clip index to an error raised without one.
    pub fn at(self, index: usize) -> Self {
        match self {
            FitError::ClipTooShort {
                duration, minimum, ..
            } => FitError::ClipTooShort {
                index: Some(index),
                duration,
                minimum,
            },
            FitError::InvalidDuration { value, .. } => FitError::InvalidDuration {
                index: Some(index),
                value,
            },
            other => other,
        }
    }

    /// Index of the offending clip, if known.
    pub fn index(&self) -> Option<usize> {
        match self {
            FitError::ClipTooShort { index, .. } | FitError::InvalidDuration { index, .. } => {
                *index
            }
            FitError::CountMismatch { .. } => None,
        }
    }
}

/// Type alias for fitting results.
pub type FitResult<T> = Result<T, FitError>;
