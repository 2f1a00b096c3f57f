//! Runs a run spec end to end: directories, logger, manifest, pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::logging::{LogCallback, LogConfig, RunLogger};
use crate::manifest::RunManifest;

use super::errors::PipelineError;
use super::pipeline::Pipeline;
use super::types::{ProgressCallback, RunContext, RunSpec, RunState};
use super::{create_standard_pipeline, PipelineRunResult};

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub error: Option<String>,
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl RunResult {
    pub fn success(
        run_id: String,
        output_path: PathBuf,
        manifest_path: PathBuf,
        run_result: PipelineRunResult,
    ) -> Self {
        Self {
            run_id,
            success: true,
            output_path: Some(output_path),
            manifest_path: Some(manifest_path),
            error: None,
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
        }
    }

    pub fn failure(run_id: String, error: impl Into<String>) -> Self {
        Self {
            run_id,
            success: false,
            output_path: None,
            manifest_path: None,
            error: Some(error.into()),
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        }
    }
}

/// Sets up and executes runs with the standard pipeline.
pub struct RunProcessor {
    settings: Settings,
    log_dir: PathBuf,
    work_root: PathBuf,
    output_dir: PathBuf,
}

impl RunProcessor {
    pub fn new(settings: Settings, log_dir: PathBuf, work_root: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            settings,
            log_dir,
            work_root,
            output_dir,
        }
    }

    /// Directories from the configured paths.
    pub fn from_settings(settings: Settings) -> Self {
        let paths = settings.paths.clone();
        Self::new(
            settings,
            PathBuf::from(paths.logs_folder),
            PathBuf::from(paths.temp_root),
            PathBuf::from(paths.output_folder),
        )
    }

    /// Run `spec` with the standard pipeline.
    pub fn process_run(
        &self,
        spec: RunSpec,
        log_callback: Option<LogCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> RunResult {
        let pipeline = create_standard_pipeline();
        self.process_run_with(&pipeline, spec, log_callback, progress_callback)
    }

    /// Run `spec` in `<work_root>/<name>` with `pipeline`.
    ///
    /// Take a [`CancelHandle`](super::CancelHandle) from the pipeline
    /// beforehand to stop the run at a step boundary. An existing manifest
    /// in the work directory is reused, so a rerun keeps its run id and
    /// artifact history.
    pub fn process_run_with(
        &self,
        pipeline: &Pipeline,
        spec: RunSpec,
        log_callback: Option<LogCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> RunResult {
        if let Err(message) = spec.validate() {
            let error = PipelineError::validation_failed(&spec.name, message);
            return RunResult::failure(spec.name.clone(), error.to_string());
        }

        let run_name = spec.name.clone();
        let work_dir = self.work_root.join(&run_name);
        if let Err(e) = std::fs::create_dir_all(&work_dir) {
            let error = PipelineError::setup_failed(&run_name, format!("work directory: {}", e));
            return RunResult::failure(run_name, error.to_string());
        }

        let logger = match RunLogger::new(
            &run_name,
            &self.log_dir,
            LogConfig::from_settings(&self.settings.logging),
            log_callback,
        ) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                let error = PipelineError::setup_failed(&run_name, format!("logger: {}", e));
                return RunResult::failure(run_name, error.to_string());
            }
        };

        let manifest_path = work_dir.join("manifest.json");
        let manifest = match RunManifest::load_or_create(&run_name, &manifest_path) {
            Ok(m) => m,
            Err(e) => {
                let error = PipelineError::setup_failed(&run_name, format!("manifest: {}", e));
                return RunResult::failure(run_name, error.to_string());
            }
        };
        let run_id = manifest.run_id.to_string();

        let scene_count = spec.scenes.len();
        let overlay_count = spec.overlays.len();
        let mut ctx = RunContext::new(
            spec,
            self.settings.clone(),
            &run_name,
            work_dir,
            self.output_dir.clone(),
            logger,
        );
        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut state = RunState::new(&run_id).with_manifest(manifest);

        ctx.logger.info(&format!("Starting run: {} ({})", run_name, run_id));
        ctx.logger.info(&format!(
            "Scenes: {}, overlays: {}",
            scene_count, overlay_count
        ));

        let result = match pipeline.run(&ctx, &mut state) {
            Ok(run_result) => {
                let output_path = state
                    .render
                    .as_ref()
                    .map(|r| r.output_path.clone())
                    .unwrap_or_else(|| ctx.output_path());
                ctx.logger
                    .info(&format!("Run completed: {}", output_path.display()));
                RunResult::success(run_id, output_path, manifest_path, run_result)
            }
            Err(e) => {
                let error_msg = format!("Pipeline failed: {}", e);
                ctx.logger.error(&error_msg);
                RunResult::failure(run_id, error_msg)
            }
        };
        ctx.logger.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::types::tests::sample_spec;
    use tempfile::tempdir;

    #[test]
    fn run_result_success() {
        let run_result = PipelineRunResult {
            steps_completed: vec!["Segment".to_string(), "Render".to_string()],
            steps_skipped: vec!["Composite".to_string()],
        };

        let result = RunResult::success(
            "run-123".to_string(),
            PathBuf::from("/output/harbor.mp4"),
            PathBuf::from("/work/harbor/manifest.json"),
            run_result,
        );

        assert!(result.success);
        assert_eq!(result.run_id, "run-123");
        assert!(result.error.is_none());
        assert_eq!(result.steps_completed.len(), 2);
    }

    #[test]
    fn invalid_spec_fails_before_setup() {
        let dir = tempdir().unwrap();
        let processor = RunProcessor::new(
            Settings::default(),
            dir.path().join("logs"),
            dir.path().join("work"),
            dir.path().join("out"),
        );
        let mut spec = sample_spec();
        spec.scenes.clear();

        let result = processor.process_run(spec, None, None);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no scenes"));
        assert!(!dir.path().join("work").exists());
    }

    #[test]
    fn failed_run_keeps_its_manifest() {
        let dir = tempdir().unwrap();
        let processor = RunProcessor::new(
            Settings::default(),
            dir.path().join("logs"),
            dir.path().join("work"),
            dir.path().join("out"),
        );

        let result = processor.process_run(sample_spec(), None, None);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Segment"));

        let manifest_path = dir.path().join("work").join("harbor").join("manifest.json");
        let manifest = RunManifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.run_id.to_string(), result.run_id);
        assert!(manifest.completed_stages.is_empty());
    }

    #[test]
    fn cancelled_pipeline_stops_before_first_step() {
        let dir = tempdir().unwrap();
        let processor = RunProcessor::new(
            Settings::default(),
            dir.path().join("logs"),
            dir.path().join("work"),
            dir.path().join("out"),
        );
        let pipeline = create_standard_pipeline();
        pipeline.cancel_handle().cancel();

        let result = processor.process_run_with(&pipeline, sample_spec(), None, None);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
    }
}
