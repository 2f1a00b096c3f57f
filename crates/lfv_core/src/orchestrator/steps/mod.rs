//! Pipeline step implementations.
//!
//! Each step handles one stage of assembly, in order:
//! segment narration, fit clips, assemble the timeline, mix audio,
//! composite overlays, render.

mod assemble;
mod composite;
mod fit;
mod mix;
mod render;
mod segment;

pub use assemble::AssembleStep;
pub use composite::CompositeStep;
pub use fit::FitStep;
pub use mix::MixStep;
pub use render::RenderStep;
pub use segment::SegmentStep;

use std::fs;
use std::path::Path;

use serde::Serialize;

use super::errors::{StepError, StepResult};

/// Write a stage output as pretty JSON into the work directory.
fn write_json<T: Serialize>(path: &Path, value: &T) -> StepResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StepError::io_error("creating work directory", e))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StepError::parse_error(path.display().to_string(), e.to_string()))?;
    fs::write(path, json).map_err(|e| StepError::io_error(format!("writing {}", path.display()), e))
}
