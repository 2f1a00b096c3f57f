//! Types for rendering.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{MediaKind, TransitionKind};
use crate::overlay::OverlayPosition;
use crate::timeline::OutroSpec;

/// Current EDL format version.
pub const EDL_VERSION: u32 = 2;

/// One clip as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlClip {
    pub index: usize,
    pub source: PathBuf,
    pub kind: MediaKind,
    pub trim_start: f64,
    pub trim_end: f64,
    /// Start on the output timeline.
    pub timeline_start: f64,
    /// Seconds of footage, including any outgoing transition overlap.
    pub duration: f64,
}

/// Transition between clip `boundary` and `boundary + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdlTransition {
    pub boundary: usize,
    pub kind: TransitionKind,
    pub duration: f64,
    /// Output time at which the transition begins.
    pub offset: f64,
}

/// Mixed audio to lay under the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlAudio {
    pub path: PathBuf,
    pub duration: f64,
}

/// Text with its style resolved against the frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlText {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub font_size: u32,
    pub subtitle_size: u32,
    /// Space between the text and the subtitle line.
    pub line_gap: u32,
    pub font_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_color: Option<String>,
    pub shadow: bool,
}

impl EdlText {
    /// Height of the whole block in pixels.
    pub fn block_height(&self) -> u32 {
        match self.subtitle {
            Some(_) => self.font_size + self.line_gap + self.subtitle_size,
            None => self.font_size,
        }
    }
}

/// What an overlay layer draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdlOverlayContent {
    /// Read as an extra ffmpeg input.
    File { path: PathBuf },
    /// Drawn with `drawtext`; needs no input.
    Text(EdlText),
}

/// One overlay layer, already placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlOverlay {
    pub z: usize,
    pub content: EdlOverlayContent,
    pub position: OverlayPosition,
    pub start: f64,
    pub end: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub scale: f64,
    pub opacity: f64,
    /// ffmpeg `overlay` (file) or `drawtext` (text) x expression.
    pub x: String,
    /// y expression; for text, the top of the block.
    pub y: String,
    pub loops: bool,
    pub still: bool,
}

impl EdlOverlay {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Source file, for overlays read as an input.
    pub fn input_path(&self) -> Option<&PathBuf> {
        match &self.content {
            EdlOverlayContent::File { path } => Some(path),
            EdlOverlayContent::Text(_) => None,
        }
    }
}

/// Everything needed to render the final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditDecisionList {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Length of the rendered output.
    pub output_duration: f64,
    pub clips: Vec<EdlClip>,
    pub transitions: Vec<EdlTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outro: Option<OutroSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<EdlAudio>,
    #[serde(default)]
    pub overlays: Vec<EdlOverlay>,
}

impl EditDecisionList {
    /// End of the last clip before any black hold.
    pub fn video_duration(&self) -> f64 {
        self.clips
            .last()
            .map(|c| c.timeline_start + c.duration)
            .unwrap_or(0.0)
    }

    /// Seconds each clip shows before the next one starts.
    ///
    /// Used when joining with hard cuts: clip boundaries stay where the
    /// transitions would have placed them, so the total length is unchanged.
    pub fn cut_durations(&self) -> Vec<f64> {
        self.clips
            .iter()
            .enumerate()
            .map(|(i, clip)| match self.clips.get(i + 1) {
                Some(next) => next.timeline_start - clip.timeline_start,
                None => clip.duration,
            })
            .collect()
    }
}

/// Stage of the render that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStage {
    Trim,
    Join,
    Final,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStage::Trim => write!(f, "trim"),
            RenderStage::Join => write!(f, "join"),
            RenderStage::Final => write!(f, "final"),
        }
    }
}

/// Paths produced by a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub output_path: PathBuf,
    pub edl_path: PathBuf,
    /// Join strategy that produced the base video.
    pub join_strategy: String,
    pub duration: f64,
}

/// Errors from rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// ffmpeg failed at some stage.
    #[error("Render failed at {stage}{}: exit code {exit_code}: {message}", describe_index(.index))]
    RenderFailure {
        stage: RenderStage,
        index: Option<usize>,
        exit_code: i32,
        message: String,
    },

    /// Every join strategy failed.
    #[error("All join strategies failed: {0}")]
    JoinExhausted(String),

    #[error("Invalid edit decision list: {0}")]
    InvalidEdl(String),

    #[error("EDL serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" (clip {})", i),
        None => String::new(),
    }
}

impl RenderError {
    pub fn failure(
        stage: RenderStage,
        index: Option<usize>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::RenderFailure {
            stage,
            index,
            exit_code,
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Type alias for render results.
pub type RenderResult<T> = Result<T, RenderError>;
