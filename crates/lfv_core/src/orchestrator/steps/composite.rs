//! Composite step - lays overlays over the assembled timeline.

use serde_json::json;

use crate::models::MediaKind;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{RunContext, RunState, StepOutcome};
use crate::overlay::{BaseTrack, OverlayCompositor, OverlaySpec};

use super::write_json;

/// Builds the overlay layer graph. Skipped when the run has no overlays.
pub struct CompositeStep;

impl CompositeStep {
    pub fn new() -> Self {
        Self
    }

    /// Fill in the length of animated overlays that did not declare one.
    fn with_native_durations(&self, ctx: &RunContext) -> StepResult<Vec<OverlaySpec>> {
        let probe = ctx.probe();
        ctx.spec
            .overlays
            .iter()
            .map(|spec| -> StepResult<OverlaySpec> {
                let mut spec = spec.clone();
                if let Some(path) = spec.source.path() {
                    if spec.native_duration.is_none()
                        && MediaKind::from_path(path) == MediaKind::Video
                    {
                        spec.native_duration = Some(probe.duration(path)?);
                    }
                }
                Ok(spec)
            })
            .collect()
    }
}

impl Default for CompositeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CompositeStep {
    fn name(&self) -> &str {
        "Composite"
    }

    fn description(&self) -> &str {
        "Place overlays over the timeline"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn validate_input(&self, ctx: &RunContext) -> StepResult<()> {
        for path in ctx.spec.overlays.iter().filter_map(|o| o.source.path()) {
            if !path.exists() {
                return Err(StepError::file_not_found(path.display().to_string()));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        if ctx.spec.overlays.is_empty() {
            return Ok(StepOutcome::Skipped("no overlays".to_string()));
        }

        let timeline = state
            .timeline
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Assemble step has not run"))?;
        let base = BaseTrack {
            duration: timeline.total_duration(),
            width: ctx.settings.render.width,
            height: ctx.settings.render.height,
        };

        let overlays = self.with_native_durations(ctx)?;
        let graph = OverlayCompositor::new().composite(&base, &overlays)?;
        ctx.logger.info(&format!(
            "{} overlay layer(s) over {:.3}s",
            graph.layers.len(),
            base.duration
        ));

        let path = ctx.work_dir.join("layers.json");
        write_json(&path, &graph)?;
        state.record("composite", None, json!({ "overlays": overlays }), &path)?;

        state.layers = Some(graph);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
        let (Some(graph), Some(timeline)) = (&state.layers, &state.timeline) else {
            return Err(StepError::invalid_output("Layer graph not recorded"));
        };
        if (graph.output_duration() - timeline.total_duration()).abs() > 1e-9 {
            return Err(StepError::invalid_output(format!(
                "Overlays changed the output length to {:.3}s",
                graph.output_duration()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::steps::test_support::touch;
    use crate::orchestrator::types::tests::{context_in, sample_spec};
    use crate::overlay::{OverlayError, OverlayPosition};
    use crate::render::edl::tests::sample_timeline;
    use tempfile::tempdir;

    #[test]
    fn composite_step_has_correct_name() {
        let step = CompositeStep::new();
        assert_eq!(step.name(), "Composite");
        assert!(step.is_optional());
    }

    #[test]
    fn no_overlays_is_skipped() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path(), sample_spec());
        let outcome = CompositeStep::new()
            .execute(&ctx, &mut RunState::new("composite"))
            .unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
    }

    #[test]
    fn overlays_keep_the_timeline_length() {
        let dir = tempdir().unwrap();
        let title = dir.path().join("title.png");
        touch(&title);
        let mut spec = sample_spec();
        spec.overlays = vec![OverlaySpec::new(
            &title,
            OverlayPosition::LowerThirdLeft,
            1.0,
            3.0,
        )];
        let ctx = context_in(dir.path(), spec);

        let mut state = RunState::new("composite");
        state.timeline = Some(sample_timeline());

        let step = CompositeStep::new();
        step.validate_input(&ctx).unwrap();
        assert_eq!(step.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();
        assert_eq!(state.layers.unwrap().layers.len(), 1);
    }

    #[test]
    fn text_overlays_need_no_files() {
        let dir = tempdir().unwrap();
        let mut spec = sample_spec();
        spec.overlays = vec![
            OverlaySpec::text("Harbor Master", OverlayPosition::LowerThirdLeft, 1.0, 3.0)
                .with_subtitle("Port of Leith"),
            OverlaySpec::text("The Harbor", OverlayPosition::Center, 0.0, 2.0),
        ];
        let ctx = context_in(dir.path(), spec);

        let mut state = RunState::new("composite");
        state.timeline = Some(sample_timeline());

        let step = CompositeStep::new();
        step.validate_input(&ctx).unwrap();
        assert_eq!(step.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();

        let graph = state.layers.unwrap();
        assert!(graph.layers.iter().all(|l| l.spec.source.is_text() && l.still));
        assert_eq!(graph.layers[1].z, 1);
    }

    #[test]
    fn overlay_past_the_end_is_rejected() {
        let dir = tempdir().unwrap();
        let title = dir.path().join("title.png");
        touch(&title);
        let mut spec = sample_spec();
        spec.overlays = vec![OverlaySpec::new(&title, OverlayPosition::Center, 10.0, 5.0)];
        let ctx = context_in(dir.path(), spec);

        let mut state = RunState::new("composite");
        state.timeline = Some(sample_timeline());

        let err = CompositeStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(
            err,
            StepError::Overlay(OverlayError::WindowOutOfRange { index: 0, .. })
        ));
    }
}
