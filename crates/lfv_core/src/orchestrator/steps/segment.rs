//! Segment step - splits the narration into one span per scene.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::fitting::merge_short_segments;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{AlignmentFile, RunContext, RunState, SegmentOutput, StepOutcome};
use crate::timing::{
    default_chain, segment_with_fallback, words_from_characters, NarrationInput, SegmenterConfig,
    WordTiming,
};

use super::write_json;

/// Probes the voiceover and runs the segmentation fallback chain.
///
/// Alignment problems are not errors here: they make the aligned
/// strategy fail and the uniform split take over.
pub struct SegmentStep;

impl SegmentStep {
    pub fn new() -> Self {
        Self
    }

    fn load_words(&self, ctx: &RunContext, path: &Path) -> Option<Vec<WordTiming>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                ctx.logger
                    .warn(&format!("Cannot read alignment {}: {}", path.display(), e));
                return None;
            }
        };
        let parsed = match serde_json::from_str::<AlignmentFile>(&content) {
            Ok(p) => p,
            Err(e) => {
                ctx.logger
                    .warn(&format!("Cannot parse alignment {}: {}", path.display(), e));
                return None;
            }
        };
        match parsed {
            AlignmentFile::Words(words) => Some(words),
            AlignmentFile::Characters(chars) => match words_from_characters(&chars) {
                Ok(words) => Some(words),
                Err(e) => {
                    ctx.logger.warn(&e.to_string());
                    None
                }
            },
        }
    }
}

impl Default for SegmentStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SegmentStep {
    fn name(&self) -> &str {
        "Segment"
    }

    fn description(&self) -> &str {
        "Split narration into scene segments"
    }

    fn validate_input(&self, ctx: &RunContext) -> StepResult<()> {
        if !ctx.spec.narration.exists() {
            return Err(StepError::file_not_found(
                ctx.spec.narration.display().to_string(),
            ));
        }
        if ctx.spec.scenes.is_empty() {
            return Err(StepError::invalid_input("Run has no scenes"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        let narration_duration = ctx.probe().duration(&ctx.spec.narration)?;
        ctx.logger
            .info(&format!("Narration: {:.3}s", narration_duration));

        let words = ctx
            .spec
            .alignment
            .as_deref()
            .and_then(|path| self.load_words(ctx, path));

        let input = NarrationInput {
            words,
            total_duration: narration_duration,
            scene_texts: ctx.spec.scene_texts(),
        };
        let chain = default_chain(SegmenterConfig::from_settings(&ctx.settings.timing));
        let mut outcome = segment_with_fallback(&chain, &input)?;

        for attempt in &outcome.attempts {
            ctx.logger.warn(&format!(
                "Segmentation '{}' failed: {}",
                attempt.strategy, attempt.reason
            ));
        }

        let mut merged = false;
        if ctx.settings.fitting.merge_short_segments {
            let min = ctx.settings.fitting.min_clip_duration;
            let before = outcome.segments.len();
            outcome.segments = merge_short_segments(&outcome.segments, min)?;
            if outcome.segments.len() != before {
                merged = true;
                ctx.logger.warn(&format!(
                    "Merged {} short segment(s) below {:.1}s",
                    before - outcome.segments.len(),
                    min
                ));
            }
        }

        ctx.logger.info(&format!(
            "{} segments by '{}'",
            outcome.segments.len(),
            outcome.strategy
        ));

        let path = ctx.work_dir.join("segments.json");
        write_json(&path, &outcome)?;
        state.record(
            "segment",
            None,
            json!({
                "narration": ctx.spec.narration,
                "alignment": ctx.spec.alignment,
                "strategy": outcome.strategy,
            }),
            &path,
        )?;

        state.segments = Some(SegmentOutput {
            narration_duration,
            outcome,
            merged,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
        if !state.has_segments() {
            return Err(StepError::invalid_output("Segments not recorded"));
        }
        match &state.segments {
            Some(out) if out.outcome.segments.is_empty() => {
                Err(StepError::invalid_output("Segmentation produced no segments"))
            }
            _ => Ok(()),
        }
    }
}
