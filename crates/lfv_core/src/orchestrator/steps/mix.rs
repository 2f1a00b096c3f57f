//! Mix step - sums the voiceover with music and effects beds.

use serde_json::json;

use crate::audio::{AudioMixer, FfmpegAudioSource};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{RunContext, RunState, StepOutcome};

/// Mixes every audio track of the run into one WAV in the work directory.
pub struct MixStep;

impl MixStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MixStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MixStep {
    fn name(&self) -> &str {
        "Mix"
    }

    fn description(&self) -> &str {
        "Mix voiceover, music and effects"
    }

    fn validate_input(&self, ctx: &RunContext) -> StepResult<()> {
        for track in ctx.audio_tracks() {
            if !track.path.exists() {
                return Err(StepError::file_not_found(track.path.display().to_string()));
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
        let render = &ctx.settings.render;
        let source = FfmpegAudioSource::from_settings(
            render.ffmpeg_path.clone(),
            render.ffprobe_path.clone(),
            &ctx.settings.audio,
        );
        let mixer = AudioMixer::from_settings(Box::new(source), &ctx.settings.audio);

        let tracks = ctx.audio_tracks();
        for track in &tracks {
            ctx.logger.info(&format!(
                "{} track {} at level {:.2}",
                track.role,
                track.path.display(),
                mixer.gain_for(track)
            ));
        }

        let output = ctx.work_dir.join("mix.wav");
        let mix = mixer.mix(&tracks, &output)?;

        ctx.logger.info(&format!(
            "Mix: {:.3}s, peak {:.1} dBFS, RMS {:.1} dBFS",
            mix.duration, mix.levels.peak_dbfs, mix.levels.rms_dbfs
        ));
        if mix.levels.clipped_samples > 0 {
            ctx.logger.warn(&format!(
                "Mix clipped {} samples; lower the music or effects level",
                mix.levels.clipped_samples
            ));
        }

        state.record(
            "mix",
            None,
            json!({
                "tracks": tracks,
                "sample_rate": ctx.settings.audio.sample_rate,
                "channels": ctx.settings.audio.channels,
            }),
            &output,
        )?;
        state.mix = Some(mix);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
        let mix = state
            .mix
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Mix not recorded"))?;
        if !mix.track.path.exists() {
            return Err(StepError::file_not_found(mix.track.path.display().to_string()));
        }
        Ok(())
    }
}
