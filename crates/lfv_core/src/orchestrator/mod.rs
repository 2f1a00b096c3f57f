//! Pipeline orchestrator for assembling one video.
//!
//! A run is a sequence of steps that validate, execute, and record their
//! results in a write-once `RunState` and the run manifest.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Segment    narration → segments
//!     ├── Step: Fit        scene clips → fitted clips
//!     ├── Step: Assemble   → timeline (+ outro)
//!     ├── Step: Mix        voiceover + beds → mix.wav
//!     ├── Step: Composite  overlays → layer graph (optional)
//!     └── Step: Render     EDL → ffmpeg → output video
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lfv_core::orchestrator::{create_standard_pipeline, RunContext, RunState};
//!
//! let pipeline = create_standard_pipeline();
//! let ctx = RunContext::new(spec, settings, "harbor", work_dir, output_dir, logger);
//! let mut state = RunState::new(run_id).with_manifest(manifest);
//!
//! let result = pipeline.run(&ctx, &mut state)?;
//! println!("Completed: {:?}", result.steps_completed);
//! ```

mod errors;
mod pipeline;
mod run_processor;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use run_processor::{RunProcessor, RunResult};
pub use step::PipelineStep;
pub use steps::{AssembleStep, CompositeStep, FitStep, MixStep, RenderStep, SegmentStep};
pub use types::{
    AlignmentFile, ProgressCallback, RunContext, RunSpec, RunState, SceneSpec, SegmentOutput,
    StepOutcome, TrackSpec,
};

/// Create a standard pipeline with all steps in the correct order.
///
/// 1. Segment - probe the narration and split it into scene segments
/// 2. Fit - trim each scene clip to its segment
/// 3. Assemble - place clips and transitions, add the outro if footage runs short
/// 4. Mix - mix voiceover with music and effects
/// 5. Composite - lay overlays over the timeline (skipped without overlays)
/// 6. Render - write the EDL and render it with ffmpeg
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(SegmentStep::new())
        .with_step(FitStep::new())
        .with_step(AssembleStep::new())
        .with_step(MixStep::new())
        .with_step(CompositeStep::new())
        .with_step(RenderStep::new())
}
