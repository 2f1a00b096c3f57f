//! Rendering an EDL to the final video.
//!
//! Three ffmpeg stages: every clip is trimmed and normalized to an
//! intermediate, the intermediates are joined, and a final pass adds the
//! outro, overlays and mixed audio.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RenderSettings;
use crate::logging::RunLogger;

use super::commands::RenderCommandBuilder;
use super::join::{default_join_chain, join_with_fallback, JoinRequest, JoinStrategy};
use super::runner::FfmpegRunner;
use super::types::{EditDecisionList, RenderError, RenderOutput, RenderResult, RenderStage};

/// Renders edit decision lists with ffmpeg.
pub struct Renderer {
    settings: RenderSettings,
    runner: FfmpegRunner,
    join_chain: Vec<Box<dyn JoinStrategy>>,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        let runner = FfmpegRunner::new(settings.ffmpeg_path.clone());
        Self {
            settings,
            runner,
            join_chain: default_join_chain(),
        }
    }

    pub fn with_pretty_args(mut self, enabled: bool) -> Self {
        self.runner = self.runner.with_pretty_args(enabled);
        self
    }

    /// Replace the join strategies.
    pub fn with_join_chain(mut self, chain: Vec<Box<dyn JoinStrategy>>) -> Self {
        self.join_chain = chain;
        self
    }

    /// Render `edl` to `output_path`, keeping intermediates in `work_dir`.
    ///
    /// The EDL is written to `work_dir/edl.json` before any ffmpeg call.
    pub fn render(
        &self,
        edl: &EditDecisionList,
        logger: &RunLogger,
        work_dir: &Path,
        output_path: &Path,
    ) -> RenderResult<RenderOutput> {
        edl.validate()?;

        let clips_dir = work_dir.join("clips");
        fs::create_dir_all(&clips_dir)
            .map_err(|e| RenderError::io("creating clip directory", e))?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RenderError::io("creating output directory", e))?;
        }

        let edl_path = work_dir.join("edl.json");
        edl.save(&edl_path)?;

        logger.section("Trimming clips");
        let trimmed = self.trim_clips(edl, logger, &clips_dir)?;

        let (joined, join_strategy) = if trimmed.len() == 1 {
            (trimmed[0].clone(), "single".to_string())
        } else {
            logger.section("Joining clips");
            let request = JoinRequest {
                edl,
                settings: &self.settings,
                runner: &self.runner,
                logger,
                inputs: &trimmed,
                work_dir,
            };
            join_with_fallback(&self.join_chain, &request)?
        };

        logger.section("Final pass");
        let args = RenderCommandBuilder::new(edl, &self.settings).final_pass(&joined, output_path);
        self.runner.run(logger, RenderStage::Final, None, &args)?;

        logger.success(&format!(
            "Rendered {:.2}s to {}",
            edl.output_duration,
            output_path.display()
        ));

        Ok(RenderOutput {
            output_path: output_path.to_path_buf(),
            edl_path,
            join_strategy,
            duration: edl.output_duration,
        })
    }

    fn trim_clips(
        &self,
        edl: &EditDecisionList,
        logger: &RunLogger,
        clips_dir: &Path,
    ) -> RenderResult<Vec<PathBuf>> {
        let builder = RenderCommandBuilder::new(edl, &self.settings);
        let total = edl.clips.len();
        let mut outputs = Vec::with_capacity(total);

        for (n, clip) in edl.clips.iter().enumerate() {
            let output = clips_dir.join(format!("clip_{:03}.mp4", clip.index));
            let args = builder.trim(clip, &output);
            self.runner
                .run(logger, RenderStage::Trim, Some(clip.index), &args)?;
            outputs.push(output);
            logger.progress(((n + 1) * 100 / total) as u32);
        }

        Ok(outputs)
    }
}
