//! Types for overlay compositing.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named screen position with a fixed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum OverlayPosition {
    LowerThirdLeft,
    LowerThirdCenter,
    LowerThirdRight,
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Center,
    Fullscreen,
}

impl OverlayPosition {
    pub const ALL: [OverlayPosition; 11] = [
        OverlayPosition::LowerThirdLeft,
        OverlayPosition::LowerThirdCenter,
        OverlayPosition::LowerThirdRight,
        OverlayPosition::TopLeft,
        OverlayPosition::TopCenter,
        OverlayPosition::TopRight,
        OverlayPosition::BottomLeft,
        OverlayPosition::BottomCenter,
        OverlayPosition::BottomRight,
        OverlayPosition::Center,
        OverlayPosition::Fullscreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayPosition::LowerThirdLeft => "lower_third_left",
            OverlayPosition::LowerThirdCenter => "lower_third_center",
            OverlayPosition::LowerThirdRight => "lower_third_right",
            OverlayPosition::TopLeft => "top_left",
            OverlayPosition::TopCenter => "top_center",
            OverlayPosition::TopRight => "top_right",
            OverlayPosition::BottomLeft => "bottom_left",
            OverlayPosition::BottomCenter => "bottom_center",
            OverlayPosition::BottomRight => "bottom_right",
            OverlayPosition::Center => "center",
            OverlayPosition::Fullscreen => "fullscreen",
        }
    }
}

impl std::fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OverlayPosition {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        OverlayPosition::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| OverlayError::UnknownPosition(s.to_string()))
    }
}

impl TryFrom<String> for OverlayPosition {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn default_fade() -> f64 {
    0.3
}

fn default_one() -> f64 {
    1.0
}

/// Look of a text overlay. Sizes left unset scale with the frame height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub font_size: Option<u32>,
    #[serde(default)]
    pub subtitle_size: Option<u32>,
    /// ffmpeg color; white when unset.
    #[serde(default)]
    pub font_color: Option<String>,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
    /// Box drawn behind the text, e.g. `black@0.5`.
    #[serde(default)]
    pub box_color: Option<String>,
    /// Drop shadow for readability over footage.
    #[serde(default = "default_true")]
    pub shadow: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: None,
            subtitle_size: None,
            font_color: None,
            font_file: None,
            box_color: None,
            shadow: true,
        }
    }
}

/// What an overlay draws.
///
/// Deserializes from a path string or from a `{ "text": ... }` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverlaySource {
    /// Image or animation file.
    File(PathBuf),
    /// Text drawn by ffmpeg: a lower third (name and subtitle) or a title card.
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
        #[serde(default)]
        style: TextStyle,
    },
}

impl OverlaySource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            OverlaySource::File(path) => Some(path),
            OverlaySource::Text { .. } => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OverlaySource::Text { .. })
    }
}

impl std::fmt::Display for OverlaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlaySource::File(path) => write!(f, "{}", path.display()),
            OverlaySource::Text { text, .. } => write!(f, "text '{}'", text),
        }
    }
}

/// One overlay as requested by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub source: OverlaySource,
    pub position: OverlayPosition,
    /// Seconds into the base track.
    pub start_time: f64,
    pub duration: f64,
    #[serde(default = "default_fade")]
    pub fade_in: f64,
    #[serde(default = "default_fade")]
    pub fade_out: f64,
    #[serde(default = "default_one")]
    pub scale: f64,
    /// Peak opacity (0..=1).
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
    /// Clip the window at the end of the base track instead of failing.
    #[serde(default)]
    pub run_to_end: bool,
    /// Length of animated sources; `None` for stills.
    #[serde(default)]
    pub native_duration: Option<f64>,
}

impl OverlaySpec {
    pub fn new(
        source: impl Into<PathBuf>,
        position: OverlayPosition,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self::with_source(OverlaySource::File(source.into()), position, start_time, duration)
    }

    /// A text overlay with the default style.
    pub fn text(
        text: impl Into<String>,
        position: OverlayPosition,
        start_time: f64,
        duration: f64,
    ) -> Self {
        let source = OverlaySource::Text {
            text: text.into(),
            subtitle: None,
            style: TextStyle::default(),
        };
        Self::with_source(source, position, start_time, duration)
    }

    fn with_source(
        source: OverlaySource,
        position: OverlayPosition,
        start_time: f64,
        duration: f64,
    ) -> Self {
        Self {
            source,
            position,
            start_time,
            duration,
            fade_in: default_fade(),
            fade_out: default_fade(),
            scale: 1.0,
            opacity: 1.0,
            x_offset: 0,
            y_offset: 0,
            run_to_end: false,
            native_duration: None,
        }
    }

    /// Second, smaller line under a text overlay. No effect on files.
    pub fn with_subtitle(mut self, line: impl Into<String>) -> Self {
        if let OverlaySource::Text { subtitle, .. } = &mut self.source {
            *subtitle = Some(line.into());
        }
        self
    }

    pub fn with_fades(mut self, fade_in: f64, fade_out: f64) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    pub fn with_native_duration(mut self, seconds: f64) -> Self {
        self.native_duration = Some(seconds);
        self
    }

    pub fn running_to_end(mut self) -> Self {
        self.run_to_end = true;
        self
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// The track overlays are drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseTrack {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// Pixel rectangle of a placed overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// One overlay resolved against the base track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Stacking order; higher draws on top.
    pub z: usize,
    pub spec: OverlaySpec,
    pub window_start: f64,
    pub window_end: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    /// Animated source shorter than its window, repeated to fill it.
    pub loops: bool,
    /// Still image held for the window.
    pub still: bool,
}

impl Layer {
    pub fn window_duration(&self) -> f64 {
        self.window_end - self.window_start
    }

    /// Opacity at base-track time `t`, including fades.
    pub fn opacity_at(&self, t: f64) -> f64 {
        if t < self.window_start || t >= self.window_end {
            return 0.0;
        }
        let mut ramp: f64 = 1.0;
        if self.fade_in > 0.0 {
            ramp = ramp.min((t - self.window_start) / self.fade_in);
        }
        if self.fade_out > 0.0 {
            ramp = ramp.min((self.window_end - t) / self.fade_out);
        }
        ramp.clamp(0.0, 1.0) * self.spec.opacity
    }
}

/// Base track plus layers, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGraph {
    pub base: BaseTrack,
    /// Layers in z order (declaration order).
    pub layers: Vec<Layer>,
}

impl LayerGraph {
    /// Output length. Always the base track's length.
    pub fn output_duration(&self) -> f64 {
        self.base.duration
    }

    /// Layers with non-zero opacity at `t`, bottom to top, with their opacity.
    pub fn visible_layers_at(&self, t: f64) -> Vec<(usize, f64)> {
        self.layers
            .iter()
            .map(|l| (l.z, l.opacity_at(t)))
            .filter(|(_, o)| *o > 0.0)
            .collect()
    }
}

/// Errors from overlay compositing.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Unknown overlay position '{0}'")]
    UnknownPosition(String),

    #[error("Overlay {index} window {start:.2}..{end:.2}s is outside the {base_duration:.2}s base track")]
    WindowOutOfRange {
        index: usize,
        start: f64,
        end: f64,
        base_duration: f64,
    },

    #[error("Overlay {index} fades ({fade_in:.2}s + {fade_out:.2}s) exceed its {duration:.2}s window")]
    InvalidFades {
        index: usize,
        fade_in: f64,
        fade_out: f64,
        duration: f64,
    },

    #[error("Overlay {index} is invalid: {reason}")]
    InvalidOverlay { index: usize, reason: String },
}

/// Type alias for overlay results.
pub type OverlayResult<T> = Result<T, OverlayError>;
