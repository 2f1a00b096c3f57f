//! Clip fitting.
//!
//! Maps each narration segment's duration onto its source clip: trimming
//! long clips, using short clips in full and reporting the deficit, and
//! rejecting anything under the minimum clip duration.

mod fitter;
mod merge;
mod types;

pub use fitter::{ClipFitter, MIN_CLIP_DURATION};
pub use merge::merge_short_segments;
pub use types::{FitError, FitReport, FitResult, FittedClip};
