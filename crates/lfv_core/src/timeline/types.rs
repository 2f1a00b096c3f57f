//! Types for the assembled timeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fitting::FittedClip;
use crate::models::TransitionKind;
use crate::timing::NarrationSegment;

/// A transition at one clip boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    /// Seconds of overlap between the two clips.
    pub duration: f64,
}

impl TransitionSpec {
    pub fn new(kind: TransitionKind, duration: f64) -> Self {
        Self { kind, duration }
    }

    /// Hard cut.
    pub fn cut() -> Self {
        Self::new(TransitionKind::Cut, 0.0)
    }

    pub fn crossfade(duration: f64) -> Self {
        Self::new(TransitionKind::Crossfade, duration)
    }

    /// Seconds the two clips overlap. Cuts never overlap.
    pub fn overlap(&self) -> f64 {
        match self.kind {
            TransitionKind::Cut => 0.0,
            _ => self.duration.max(0.0),
        }
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self::crossfade(0.5)
    }
}

/// Which transition goes at each boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPlan {
    /// Same transition at every boundary.
    Uniform(TransitionSpec),
    /// One transition per boundary (`clips - 1` entries).
    PerBoundary(Vec<TransitionSpec>),
}

impl Default for TransitionPlan {
    fn default() -> Self {
        TransitionPlan::Uniform(TransitionSpec::default())
    }
}

impl TransitionPlan {
    /// Every boundary becomes a hard cut.
    pub fn cuts() -> Self {
        TransitionPlan::Uniform(TransitionSpec::cut())
    }

    /// Expand into one spec per boundary for `clip_count` clips.
    pub fn resolve(&self, clip_count: usize) -> TimelineResult<Vec<TransitionSpec>> {
        let boundaries = clip_count.saturating_sub(1);
        match self {
            TransitionPlan::Uniform(spec) => Ok(vec![*spec; boundaries]),
            TransitionPlan::PerBoundary(specs) => {
                if specs.len() != boundaries {
                    return Err(TimelineError::TransitionCountMismatch {
                        expected: boundaries,
                        got: specs.len(),
                    });
                }
                Ok(specs.clone())
            }
        }
    }

    /// Clip lengths to request so that, after overlaps, each clip boundary
    /// lands on its segment boundary.
    ///
    /// Every clip but the last is extended by its outgoing transition.
    pub fn fit_targets(&self, segments: &[NarrationSegment]) -> TimelineResult<Vec<f64>> {
        let transitions = self.resolve(segments.len())?;
        Ok(segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                let pad = transitions.get(i).map(TransitionSpec::overlap).unwrap_or(0.0);
                seg.duration() + pad
            })
            .collect())
    }
}

/// One clip placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: usize,
    pub segment: NarrationSegment,
    pub clip: FittedClip,
    /// Where the clip starts on the output timeline.
    pub timeline_start: f64,
    /// Transition from the previous clip into this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<TransitionSpec>,
}

impl TimelineEntry {
    /// Seconds this clip occupies on the timeline.
    pub fn duration(&self) -> f64 {
        self.clip.target_duration
    }

    pub fn timeline_end(&self) -> f64 {
        self.timeline_start + self.duration()
    }
}

/// Closing fade to black after the footage runs out.
///
/// The fade runs over the last `fade_duration` seconds of real footage,
/// then black is held for `hold_duration` seconds so the video ends with
/// the narration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutroSpec {
    pub fade_start: f64,
    pub fade_duration: f64,
    pub hold_duration: f64,
}

/// Ordered clips with transitions and an optional outro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outro: Option<OutroSpec>,
    /// Narration length the timeline was reconciled against.
    pub narration_duration: f64,
    pub frame_rate: u32,
    /// Sum of fitted clip deficits.
    pub total_deficit: f64,
}

impl Timeline {
    /// End of the last clip.
    pub fn video_duration(&self) -> f64 {
        self.entries.last().map(TimelineEntry::timeline_end).unwrap_or(0.0)
    }

    /// Output length including the black hold.
    pub fn total_duration(&self) -> f64 {
        self.video_duration() + self.outro.map(|o| o.hold_duration).unwrap_or(0.0)
    }

    /// Seconds lost to transition overlaps.
    pub fn overlap_total(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|e| e.transition_in.map(|t| t.overlap()))
            .sum()
    }

    /// One frame interval in seconds.
    pub fn frame_interval(&self) -> f64 {
        1.0 / f64::from(self.frame_rate.max(1))
    }

    /// Whether the output length matches the narration within one frame.
    pub fn is_reconciled(&self) -> bool {
        (self.total_duration() - self.narration_duration).abs() <= self.frame_interval() + 1e-9
    }

    /// Transitions in boundary order.
    pub fn transitions(&self) -> Vec<TransitionSpec> {
        self.entries.iter().filter_map(|e| e.transition_in).collect()
    }

    /// Fitted clips in timeline order.
    pub fn clips(&self) -> Vec<FittedClip> {
        self.entries.iter().map(|e| e.clip.clone()).collect()
    }

    pub fn segments(&self) -> Vec<NarrationSegment> {
        self.entries.iter().map(|e| e.segment.clone()).collect()
    }
}

/// Errors from timeline assembly.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Segments and clips cannot be paired.
    #[error("Count mismatch: {segments} segments for {clips} clips")]
    CountMismatch { segments: usize, clips: usize },

    /// Per-boundary transition list has the wrong length.
    #[error("Count mismatch: expected {expected} transitions, got {got}")]
    TransitionCountMismatch { expected: usize, got: usize },

    /// A transition does not fit between its clips.
    #[error("Transition {boundary} ({duration:.2}s) is invalid: {reason}")]
    InvalidTransition {
        boundary: usize,
        duration: f64,
        reason: String,
    },

    /// Video is longer than narration and trimming the last clip cannot fix it.
    #[error("Video overruns narration by {overrun:.2}s but the final clip is only {final_duration:.2}s")]
    OverrunUnresolvable { overrun: f64, final_duration: f64 },

    /// Nothing to assemble.
    #[error("Timeline has no clips")]
    Empty,

    #[error("Invalid narration duration: {0}")]
    InvalidNarrationDuration(f64),
}

/// Type alias for timeline results.
pub type TimelineResult<T> = Result<T, TimelineError>;
