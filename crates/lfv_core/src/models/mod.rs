//! Data models shared across pipeline stages.
//!
//! - Enums for audio roles, transitions, trim anchors and media kinds
//! - Media references (source clips)

mod enums;
mod media;

pub use enums::{AudioRole, MediaKind, TransitionKind, TrimAnchor};
pub use media::SourceClip;
