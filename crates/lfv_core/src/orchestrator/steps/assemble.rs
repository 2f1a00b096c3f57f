//! Assemble step - places fitted clips on the narration timeline.

use serde_json::json;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{RunContext, RunState, StepOutcome};
use crate::timeline::TimelineAssembler;

use super::write_json;

/// Builds the timeline against the probed narration length.
pub struct AssembleStep;

impl AssembleStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AssembleStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AssembleStep {
    fn name(&self) -> &str {
        "Assemble"
    }

    fn description(&self) -> &str {
        "Place clips and transitions on the timeline"
    }

    fn validate_input(&self, _ctx: &RunContext) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        let segmented = state
            .segments
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Segment step has not run"))?;
        let fit = state
            .fit
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Fit step has not run"))?;

        let timeline = TimelineAssembler::from_settings(&ctx.settings.timeline).assemble_to(
            &segmented.outcome.segments,
            &fit.clips,
            &ctx.transition_plan(),
            segmented.narration_duration,
        )?;

        ctx.logger.info(&format!(
            "Timeline: {} clips, {:.3}s of footage, {:.3}s total",
            timeline.entries.len(),
            timeline.video_duration(),
            timeline.total_duration()
        ));
        if let Some(outro) = timeline.outro {
            ctx.logger.info(&format!(
                "Outro: fade at {:.3}s for {:.2}s, black hold {:.3}s",
                outro.fade_start, outro.fade_duration, outro.hold_duration
            ));
        }

        let path = ctx.work_dir.join("timeline.json");
        write_json(&path, &timeline)?;
        state.record(
            "assemble",
            None,
            json!({
                "narration_duration": timeline.narration_duration,
                "frame_rate": timeline.frame_rate,
            }),
            &path,
        )?;

        state.timeline = Some(timeline);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
        let timeline = state
            .timeline
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Timeline not recorded"))?;
        if !timeline.is_reconciled() {
            return Err(StepError::invalid_output(format!(
                "Timeline runs {:.3}s against {:.3}s of narration",
                timeline.total_duration(),
                timeline.narration_duration
            )));
        }
        Ok(())
    }
}
