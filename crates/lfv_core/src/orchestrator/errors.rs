//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Stage error → Detail

use std::io;

use thiserror::Error;

use crate::audio::MixError;
use crate::fitting::FitError;
use crate::generation::GenerationError;
use crate::manifest::ManifestError;
use crate::overlay::OverlayError;
use crate::probe::ProbeError;
use crate::render::RenderError;
use crate::timeline::TimelineError;
use crate::timing::TimingError;

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Run '{run_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The run spec was rejected before the pipeline started.
    #[error("Run '{run_name}' failed validation: {message}")]
    ValidationFailed { run_name: String, message: String },

    /// Pipeline was cancelled.
    #[error("Run '{run_name}' was cancelled")]
    Cancelled { run_name: String },

    /// Failed to set up the run (directories, manifest).
    #[error("Run '{run_name}' setup failed: {message}")]
    SetupFailed { run_name: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    pub fn setup_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(run_name: impl Into<String>) -> Self {
        Self::Cancelled {
            run_name: run_name.into(),
        }
    }

    /// The stage error underneath, if a step failed.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error from a pipeline step.
///
/// Stage errors convert in with `?` and keep their entity indices.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A required file was not found.
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    /// Parsing error (e.g., JSON alignment files).
    #[error("Failed to parse {what}: {message}")]
    ParseError { what: String, message: String },

    /// A previous step did not record its output.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Mix(#[from] MixError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn parse_error(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderStage;

    #[test]
    fn stage_errors_keep_their_index() {
        let err: StepError = FitError::ClipTooShort {
            index: Some(3),
            duration: 1.2,
            minimum: 2.5,
        }
        .into();
        assert!(err.to_string().contains("Clip 3"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err: StepError =
            RenderError::failure(RenderStage::Trim, Some(2), 1, "Invalid data").into();
        let pipeline_err = PipelineError::step_failed("harbor_story", "Render", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("harbor_story"));
        assert!(msg.contains("Render"));
        assert!(matches!(
            pipeline_err.step_error(),
            Some(StepError::Render(RenderError::RenderFailure { .. }))
        ));
    }
}
