//! Timeline assembly.
//!
//! Pairs segments with fitted clips, places clips with their transition
//! overlaps, and reconciles the video length with the narration:
//!
//! - video shorter than narration by more than one frame: one outro fades
//!   the last footage to black and holds black until the narration ends
//! - video longer than narration: the final clip is trimmed
//!
//! Assembly is a pure function of its inputs.

use crate::config::TimelineSettings;
use crate::fitting::FittedClip;
use crate::timing::NarrationSegment;

use super::types::{
    OutroSpec, Timeline, TimelineEntry, TimelineError, TimelineResult, TransitionPlan,
    TransitionSpec,
};

/// Builds timelines from segments and fitted clips.
#[derive(Debug, Clone)]
pub struct TimelineAssembler {
    frame_rate: u32,
    outro_fade: f64,
}

impl Default for TimelineAssembler {
    fn default() -> Self {
        Self::from_settings(&TimelineSettings::default())
    }
}

impl TimelineAssembler {
    pub fn new(frame_rate: u32, outro_fade: f64) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            outro_fade: outro_fade.max(0.0),
        }
    }

    pub fn from_settings(settings: &TimelineSettings) -> Self {
        Self::new(settings.frame_rate, settings.outro_fade_duration)
    }

    /// Assemble against the narration length implied by the last segment.
    pub fn assemble(
        &self,
        segments: &[NarrationSegment],
        fitted: &[FittedClip],
        plan: &TransitionPlan,
    ) -> TimelineResult<Timeline> {
        let narration = segments.last().map(|s| s.end).unwrap_or(0.0);
        self.assemble_to(segments, fitted, plan, narration)
    }

    /// Assemble against an explicit narration length (the probed audio).
    pub fn assemble_to(
        &self,
        segments: &[NarrationSegment],
        fitted: &[FittedClip],
        plan: &TransitionPlan,
        narration_duration: f64,
    ) -> TimelineResult<Timeline> {
        if segments.len() != fitted.len() {
            return Err(TimelineError::CountMismatch {
                segments: segments.len(),
                clips: fitted.len(),
            });
        }
        if fitted.is_empty() {
            return Err(TimelineError::Empty);
        }
        if !narration_duration.is_finite() || narration_duration <= 0.0 {
            return Err(TimelineError::InvalidNarrationDuration(narration_duration));
        }

        let transitions = plan.resolve(fitted.len())?;
        validate_transitions(fitted, &transitions)?;

        let mut entries = place(segments, fitted, &transitions);
        let video_end = entries.last().map(TimelineEntry::timeline_end).unwrap_or(0.0);
        let tolerance = 1.0 / f64::from(self.frame_rate);
        let shortfall = narration_duration - video_end;

        let outro = if shortfall > tolerance {
            let fade_duration = self.outro_fade.min(video_end);
            tracing::debug!(
                "Video {:.3}s short of narration; fading out at {:.3}s",
                shortfall,
                video_end - fade_duration
            );
            Some(OutroSpec {
                fade_start: (video_end - fade_duration).max(0.0),
                fade_duration,
                hold_duration: shortfall,
            })
        } else {
            if shortfall < -tolerance {
                trim_final_clip(&mut entries, -shortfall)?;
            }
            None
        };

        let total_deficit = fitted.iter().map(FittedClip::deficit).sum();

        Ok(Timeline {
            entries,
            outro,
            narration_duration,
            frame_rate: self.frame_rate,
            total_deficit,
        })
    }
}

/// Every overlap must be shorter than both clips it joins.
fn validate_transitions(
    fitted: &[FittedClip],
    transitions: &[TransitionSpec],
) -> TimelineResult<()> {
    for (boundary, spec) in transitions.iter().enumerate() {
        let invalid = |reason: String| TimelineError::InvalidTransition {
            boundary,
            duration: spec.duration,
            reason,
        };

        if !spec.duration.is_finite() || spec.duration < 0.0 {
            return Err(invalid("duration must be a non-negative number".to_string()));
        }

        let overlap = spec.overlap();
        let before = fitted[boundary].target_duration;
        let after = fitted[boundary + 1].target_duration;
        if overlap >= before || overlap >= after {
            return Err(invalid(format!(
                "longer than adjacent clips ({:.2}s, {:.2}s)",
                before, after
            )));
        }
    }
    Ok(())
}

fn place(
    segments: &[NarrationSegment],
    fitted: &[FittedClip],
    transitions: &[TransitionSpec],
) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = Vec::with_capacity(fitted.len());
    let mut cursor = 0.0;

    for (i, (segment, clip)) in segments.iter().zip(fitted).enumerate() {
        let transition_in = if i == 0 { None } else { Some(transitions[i - 1]) };
        let start = match transition_in {
            Some(t) => cursor - t.overlap(),
            None => 0.0,
        };

        entries.push(TimelineEntry {
            index: i,
            segment: segment.clone(),
            clip: clip.clone(),
            timeline_start: start,
            transition_in,
        });
        cursor = start + clip.target_duration;
    }
    entries
}

/// Shorten the last clip by `overrun` seconds.
fn trim_final_clip(entries: &mut [TimelineEntry], overrun: f64) -> TimelineResult<()> {
    let Some(last) = entries.last_mut() else {
        return Err(TimelineError::Empty);
    };

    let current = last.duration();
    let remaining = current - overrun;
    let floor = last.transition_in.map(|t| t.overlap()).unwrap_or(0.0);
    if remaining <= floor {
        return Err(TimelineError::OverrunUnresolvable {
            overrun,
            final_duration: current,
        });
    }

    tracing::debug!(
        "Trimming final clip from {:.3}s to {:.3}s to match narration",
        current,
        remaining
    );
    let clip = &mut last.clip;
    clip.trim_end = clip.trim_start + remaining;
    clip.target_duration = remaining;
    clip.requested_duration = clip.requested_duration.min(remaining);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::ClipFitter;
    use crate::models::{SourceClip, TransitionKind};

    fn segments(bounds: &[f64]) -> Vec<NarrationSegment> {
        bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| NarrationSegment::new(i, format!("s{}", i), w[0], w[1]))
            .collect()
    }

    fn fit(natives: &[f64], targets: &[f64]) -> Vec<FittedClip> {
        let fitter = ClipFitter::default();
        natives
            .iter()
            .zip(targets)
            .enumerate()
            .map(|(i, (n, t))| {
                fitter
                    .fit(&SourceClip::new(format!("clip_{}.mp4", i), *n), *t)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn outro_fades_real_footage_then_holds_black() {
        let segs = segments(&[0.0, 4.0, 8.0, 12.0]);
        let clips = fit(&[3.0, 3.0, 3.0], &[4.0, 4.0, 4.0]);

        let timeline = TimelineAssembler::default()
            .assemble(&segs, &clips, &TransitionPlan::cuts())
            .unwrap();

        assert_eq!(timeline.video_duration(), 9.0);
        let outro = timeline.outro.unwrap();
        assert_eq!(outro.fade_start, 7.5);
        assert_eq!(outro.fade_duration, 1.5);
        assert_eq!(outro.hold_duration, 3.0);
        assert_eq!(timeline.total_duration(), 12.0);
        assert_eq!(timeline.total_deficit, 3.0);
        assert!(timeline.is_reconciled());
    }

    #[test]
    fn padded_targets_keep_cuts_on_segment_boundaries() {
        let segs = segments(&[0.0, 4.0, 8.0, 12.0]);
        let plan = TransitionPlan::Uniform(TransitionSpec::crossfade(0.5));
        let targets = plan.fit_targets(&segs).unwrap();
        assert_eq!(targets, vec![4.5, 4.5, 4.0]);

        let clips = fit(&[10.0, 10.0, 10.0], &targets);
        let timeline = TimelineAssembler::default()
            .assemble(&segs, &clips, &plan)
            .unwrap();

        let starts: Vec<f64> = timeline.entries.iter().map(|e| e.timeline_start).collect();
        assert_eq!(starts, vec![0.0, 4.0, 8.0]);
        assert!(timeline.outro.is_none());
        assert_eq!(timeline.overlap_total(), 1.0);
        assert!(timeline.is_reconciled());
    }

    #[test]
    fn unpadded_crossfades_are_absorbed_by_outro() {
        let segs = segments(&[0.0, 4.0, 8.0, 12.0]);
        let clips = fit(&[10.0, 10.0, 10.0], &[4.0, 4.0, 4.0]);

        let timeline = TimelineAssembler::default()
            .assemble(&segs, &clips, &TransitionPlan::default())
            .unwrap();

        assert_eq!(timeline.video_duration(), 11.0);
        assert_eq!(timeline.outro.unwrap().hold_duration, 1.0);
        assert!(timeline.is_reconciled());
    }

    #[test]
    fn shortfall_within_one_frame_has_no_outro() {
        let segs = segments(&[0.0, 6.0, 12.0]);
        let clips = fit(&[6.0, 5.98], &[6.0, 6.0]);

        let timeline = TimelineAssembler::default()
            .assemble(&segs, &clips, &TransitionPlan::cuts())
            .unwrap();

        assert!(timeline.outro.is_none());
        assert!(timeline.is_reconciled());
    }

    #[test]
    fn overrun_trims_final_clip() {
        let segs = segments(&[0.0, 5.0, 10.0]);
        let clips = fit(&[8.0, 8.0], &[5.0, 5.0]);

        let timeline = TimelineAssembler::default()
            .assemble_to(&segs, &clips, &TransitionPlan::cuts(), 9.0)
            .unwrap();

        let last = timeline.entries.last().unwrap();
        assert_eq!(last.duration(), 4.0);
        assert_eq!(last.clip.trim_end, 4.0);
        assert_eq!(timeline.total_duration(), 9.0);
        assert!(timeline.outro.is_none());
    }

    #[test]
    fn overrun_beyond_final_clip_fails() {
        let segs = segments(&[0.0, 5.0, 10.0]);
        let clips = fit(&[8.0, 8.0], &[5.0, 5.0]);

        let err = TimelineAssembler::default()
            .assemble_to(&segs, &clips, &TransitionPlan::cuts(), 4.0)
            .unwrap_err();
        assert!(matches!(err, TimelineError::OverrunUnresolvable { .. }));
    }

    #[test]
    fn transition_longer_than_clip_is_rejected() {
        let segs = segments(&[0.0, 3.0, 6.0]);
        let clips = fit(&[3.0, 3.0], &[3.0, 3.0]);
        let plan = TransitionPlan::Uniform(TransitionSpec::new(TransitionKind::FadeBlack, 3.0));

        let err = TimelineAssembler::default()
            .assemble(&segs, &clips, &plan)
            .unwrap_err();
        assert!(matches!(err, TimelineError::InvalidTransition { boundary: 0, .. }));
    }

    #[test]
    fn per_boundary_plan_must_match_boundaries() {
        let segs = segments(&[0.0, 3.0, 6.0, 9.0]);
        let clips = fit(&[3.0, 3.0, 3.0], &[3.0, 3.0, 3.0]);
        let plan = TransitionPlan::PerBoundary(vec![TransitionSpec::cut()]);

        let err = TimelineAssembler::default()
            .assemble(&segs, &clips, &plan)
            .unwrap_err();
        assert!(matches!(
            err,
            TimelineError::TransitionCountMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let segs = segments(&[0.0, 3.0, 6.0]);
        let clips = fit(&[3.0], &[3.0]);
        let err = TimelineAssembler::default()
            .assemble(&segs, &clips, &TransitionPlan::cuts())
            .unwrap_err();
        assert!(matches!(err, TimelineError::CountMismatch { segments: 2, clips: 1 }));
    }

    #[test]
    fn assemble_is_idempotent() {
        let segs = segments(&[0.0, 4.0, 9.0, 13.0]);
        let clips = fit(&[6.0, 4.0, 3.0], &[4.0, 5.0, 4.0]);
        let assembler = TimelineAssembler::default();
        let plan = TransitionPlan::default();

        let a = assembler.assemble(&segs, &clips, &plan).unwrap();
        let b = assembler.assemble(&segs, &clips, &plan).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reconciles_across_mixed_inputs() {
        let assembler = TimelineAssembler::new(30, 1.5);
        let segs = segments(&[0.0, 3.0, 7.5, 10.0, 16.0]);
        let plans = [
            TransitionPlan::cuts(),
            TransitionPlan::default(),
            TransitionPlan::PerBoundary(vec![
                TransitionSpec::cut(),
                TransitionSpec::crossfade(1.0),
                TransitionSpec::new(TransitionKind::WipeLeft, 0.25),
            ]),
        ];
        for natives in [[9.0, 9.0, 9.0, 9.0], [3.0, 2.6, 2.5, 4.0], [3.2, 8.0, 2.5, 12.0]] {
            for plan in &plans {
                let targets = plan.fit_targets(&segs).unwrap();
                let clips = fit(&natives, &targets);
                let timeline = assembler.assemble(&segs, &clips, plan).unwrap();
                assert!(timeline.is_reconciled(), "{:?} / {:?}", natives, plan);
            }
        }
    }
}
