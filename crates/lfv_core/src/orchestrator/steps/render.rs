//! Render step - writes the EDL and renders it with ffmpeg.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{RunContext, RunState, StepOutcome};
use crate::overlay::Layout;
use crate::render::{EditDecisionList, Renderer};

/// Builds the edit decision list from the run state and renders it.
pub struct RenderStep;

impl RenderStep {
    pub fn new() -> Self {
        Self
    }

    fn build_edl(&self, ctx: &RunContext, state: &RunState) -> StepResult<EditDecisionList> {
        let timeline = state
            .timeline
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Assemble step has not run"))?;
        let render = &ctx.settings.render;
        Ok(EditDecisionList::build(
            timeline,
            state.mix.as_ref(),
            state.layers.as_ref(),
            &Layout::from_settings(&ctx.settings.overlay),
            (render.width, render.height),
        ))
    }
}

impl Default for RenderStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for RenderStep {
    fn name(&self) -> &str {
        "Render"
    }

    fn description(&self) -> &str {
        "Render the final video with ffmpeg"
    }

    fn validate_input(&self, ctx: &RunContext) -> StepResult<()> {
        if ctx.output_dir.as_os_str().is_empty() {
            return Err(StepError::invalid_input("No output directory"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        let edl = self.build_edl(ctx, state)?;
        if state.mix.is_none() {
            ctx.logger.warn("Rendering without mixed audio");
        }

        let output_path = ctx.output_path();
        let output = Renderer::new(ctx.settings.render.clone())
            .with_pretty_args(ctx.settings.logging.show_commands_pretty)
            .render(&edl, &ctx.logger, &ctx.work_dir, &output_path)?;

        ctx.logger.info(&format!(
            "Joined clips with '{}' strategy",
            output.join_strategy
        ));

        let params = serde_json::to_value(&edl)
            .map_err(|e| StepError::parse_error("edit decision list", e.to_string()))?;
        state.record("render", None, params, &output.output_path)?;
        state.render = Some(output);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
        let output = state
            .render
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Render output not recorded"))?;
        if !output.output_path.exists() {
            return Err(StepError::file_not_found(
                output.output_path.display().to_string(),
            ));
        }
        Ok(())
    }
}
