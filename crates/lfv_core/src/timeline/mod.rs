//! Timeline assembly.
//!
//! Produces the ordered list of fitted clips with transitions and the
//! closing outro that the renderer turns into video.

mod assembler;
mod types;

pub use assembler::TimelineAssembler;
pub use types::{
    OutroSpec, Timeline, TimelineEntry, TimelineError, TimelineResult, TransitionPlan,
    TransitionSpec,
};
