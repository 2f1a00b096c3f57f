//! Media references handed between stages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::MediaKind;

/// A generated or supplied clip with its probed length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceClip {
    /// Path to the media file.
    pub path: PathBuf,
    /// Native duration in seconds.
    pub native_duration: f64,
}

impl SourceClip {
    pub fn new(path: impl Into<PathBuf>, native_duration: f64) -> Self {
        Self {
            path: path.into(),
            native_duration,
        }
    }

    /// Kind of media, guessed from the file extension.
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_path(&self.path)
    }

    /// Display name for log messages.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
