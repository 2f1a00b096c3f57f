//! Core enums used throughout the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Role of an audio track in the final mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioRole {
    Voiceover,
    Music,
    Sfx,
    /// Output of the mixer.
    Mixed,
}

impl std::fmt::Display for AudioRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioRole::Voiceover => write!(f, "voiceover"),
            AudioRole::Music => write!(f, "music"),
            AudioRole::Sfx => write!(f, "sfx"),
            AudioRole::Mixed => write!(f, "mixed"),
        }
    }
}

/// Where the kept window of an over-long clip is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimAnchor {
    /// Keep the opening of the clip.
    #[default]
    Start,
    /// Keep the middle of the clip.
    Center,
}

impl std::fmt::Display for TrimAnchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrimAnchor::Start => write!(f, "start"),
            TrimAnchor::Center => write!(f, "center"),
        }
    }
}

/// Transition between two adjacent clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Hard cut, no overlap.
    Cut,
    /// Cross-dissolve.
    #[default]
    Crossfade,
    /// Dip through black.
    FadeBlack,
    WipeLeft,
    SlideLeft,
}

impl TransitionKind {
    /// Name of the matching ffmpeg `xfade` transition.
    ///
    /// `Cut` has no xfade counterpart.
    pub fn xfade_name(&self) -> Option<&'static str> {
        match self {
            TransitionKind::Cut => None,
            TransitionKind::Crossfade => Some("fade"),
            TransitionKind::FadeBlack => Some("fadeblack"),
            TransitionKind::WipeLeft => Some("wipeleft"),
            TransitionKind::SlideLeft => Some("slideleft"),
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::Cut => write!(f, "cut"),
            TransitionKind::Crossfade => write!(f, "crossfade"),
            TransitionKind::FadeBlack => write!(f, "fade_black"),
            TransitionKind::WipeLeft => write!(f, "wipe_left"),
            TransitionKind::SlideLeft => write!(f, "slide_left"),
        }
    }
}

/// Broad kind of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    /// Guess the kind from a file extension. Unknown extensions are video.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "bmp" => MediaKind::Image,
            "wav" | "mp3" | "m4a" | "aac" | "flac" | "ogg" | "opus" => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_kind_maps_to_xfade() {
        assert_eq!(TransitionKind::Crossfade.xfade_name(), Some("fade"));
        assert_eq!(TransitionKind::Cut.xfade_name(), None);
    }

    #[test]
    fn media_kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.PNG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("vo.mp3")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("clip.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Video);
    }

    #[test]
    fn serde_names_are_stable() {
        let json = serde_json::to_string(&TransitionKind::FadeBlack).unwrap();
        assert_eq!(json, "\"fade_black\"");
        let role: AudioRole = serde_json::from_str("\"music\"").unwrap();
        assert_eq!(role, AudioRole::Music);
    }
}
