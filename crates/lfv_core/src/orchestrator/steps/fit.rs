//! Fit step - trims every scene clip to its narration segment.

use serde_json::json;

use crate::fitting::{ClipFitter, FitError};
use crate::models::{MediaKind, SourceClip};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{RunContext, RunState, StepOutcome};

use super::write_json;

/// Probes each scene clip and fits it to its segment.
///
/// Targets are padded by each clip's outgoing transition so clip
/// boundaries land on segment boundaries after overlaps. Stills have no
/// native length and are held for exactly their target.
pub struct FitStep;

impl FitStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FitStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for FitStep {
    fn name(&self) -> &str {
        "Fit"
    }

    fn description(&self) -> &str {
        "Trim scene clips to their segments"
    }

    fn validate_input(&self, ctx: &RunContext) -> StepResult<()> {
        for scene in &ctx.spec.scenes {
            if !scene.clip.exists() {
                return Err(StepError::file_not_found(scene.clip.display().to_string()));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        let segments = state
            .segments
            .as_ref()
            .map(|s| s.outcome.segments.clone())
            .ok_or_else(|| StepError::precondition_failed("Segment step has not run"))?;

        if segments.len() != ctx.spec.scenes.len() {
            return Err(FitError::CountMismatch {
                clips: ctx.spec.scenes.len(),
                segments: segments.len(),
            }
            .into());
        }

        let targets = ctx.transition_plan().fit_targets(&segments)?;
        let probe = ctx.probe();

        let mut clips = Vec::with_capacity(targets.len());
        for (scene, target) in ctx.spec.scenes.iter().zip(&targets) {
            let native = match MediaKind::from_path(&scene.clip) {
                MediaKind::Image => *target,
                _ => probe.duration(&scene.clip)?,
            };
            // Informational only; the trim stage scales every clip.
            if let Ok((w, h)) = probe.video_dimensions(&scene.clip) {
                if (w, h) != (ctx.settings.render.width, ctx.settings.render.height) {
                    ctx.logger.debug(&format!(
                        "{} is {}x{}, will be scaled",
                        scene.clip.display(),
                        w,
                        h
                    ));
                }
            }
            clips.push(SourceClip::new(&scene.clip, native));
        }

        let report = ClipFitter::from_settings(&ctx.settings.fitting).fit_to_targets(&clips, &targets)?;

        for (i, clip) in report.clips.iter().enumerate() {
            if clip.is_short() {
                ctx.logger.warn(&format!(
                    "Scene {} clip {} is {:.2}s short",
                    i,
                    clip.source.display_name(),
                    clip.deficit()
                ));
            }
            state.record(
                "fit",
                Some(i),
                json!({
                    "trim_start": clip.trim_start,
                    "trim_end": clip.trim_end,
                    "requested": clip.requested_duration,
                }),
                &clip.source.path,
            )?;
        }
        if report.total_deficit > 0.0 {
            ctx.logger.info(&format!(
                "Footage is {:.2}s short of the narration in total",
                report.total_deficit
            ));
        }

        write_json(&ctx.work_dir.join("fit.json"), &report)?;
        state.fit = Some(report);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &RunContext, state: &RunState) -> StepResult<()> {
        match &state.fit {
            Some(report) if report.clips.len() == ctx.spec.scenes.len() => Ok(()),
            Some(report) => Err(StepError::invalid_output(format!(
                "{} fitted clips for {} scenes",
                report.clips.len(),
                ctx.spec.scenes.len()
            ))),
            None => Err(StepError::invalid_output("Fit report not recorded")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::steps::test_support::{fake_ffprobe, touch};
    use crate::orchestrator::types::tests::{context_in, sample_spec};
    use crate::orchestrator::types::SegmentOutput;
    use crate::timing::{NarrationSegment, SegmentationOutcome};
    use tempfile::tempdir;

    fn segmented(ends: &[f64]) -> SegmentOutput {
        let mut start = 0.0;
        let segments = ends
            .iter()
            .enumerate()
            .map(|(i, end)| {
                let seg = NarrationSegment::new(i, format!("s{}", i), start, *end);
                start = *end;
                seg
            })
            .collect();
        SegmentOutput {
            narration_duration: start,
            outcome: SegmentationOutcome {
                segments,
                strategy: "uniform".to_string(),
                attempts: Vec::new(),
            },
            merged: false,
        }
    }

    #[test]
    fn fit_step_has_correct_name() {
        assert_eq!(FitStep::new().name(), "Fit");
    }

    #[test]
    fn clips_are_padded_for_crossfades() {
        let dir = tempdir().unwrap();
        let mut spec = sample_spec();
        for scene in spec.scenes.iter_mut() {
            scene.clip = dir.path().join(&scene.clip);
            touch(&scene.clip);
        }
        let mut ctx = context_in(dir.path(), spec);
        ctx.settings.render.ffprobe_path = fake_ffprobe(dir.path(), 8.0);

        let mut state = RunState::new("fit");
        state.segments = Some(segmented(&[5.0, 10.0]));

        let step = FitStep::new();
        step.validate_input(&ctx).unwrap();
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        let report = state.fit.unwrap();
        assert_eq!(report.clips[0].target_duration, 5.5);
        assert_eq!(report.clips[1].target_duration, 5.0);
        assert_eq!(report.total_deficit, 0.0);
    }

    #[test]
    fn still_images_fill_their_target() {
        let dir = tempdir().unwrap();
        let mut spec = sample_spec();
        spec.scenes[0].clip = dir.path().join("still.png");
        spec.scenes[1].clip = dir.path().join("still2.jpg");
        touch(&spec.scenes[0].clip);
        touch(&spec.scenes[1].clip);
        let mut ctx = context_in(dir.path(), spec);
        ctx.settings.render.ffprobe_path = "/nonexistent/ffprobe".to_string();

        let mut state = RunState::new("fit");
        state.segments = Some(segmented(&[4.0, 9.0]));
        FitStep::new().execute(&ctx, &mut state).unwrap();

        let report = state.fit.unwrap();
        assert_eq!(report.clips[0].source.native_duration, 4.5);
        assert_eq!(report.clips[1].trim_end, 5.0);
    }

    #[test]
    fn segment_and_scene_counts_must_match() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path(), sample_spec());
        let mut state = RunState::new("fit");
        state.segments = Some(segmented(&[4.0, 8.0, 12.0]));

        let err = FitStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(
            err,
            StepError::Fit(FitError::CountMismatch {
                clips: 2,
                segments: 3
            })
        ));
    }

    #[test]
    fn requires_segments() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path(), sample_spec());
        let err = FitStep::new()
            .execute(&ctx, &mut RunState::new("fit"))
            .unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }
}
