//! Rendering through ffmpeg.
//!
//! The [`EditDecisionList`] is the hand-off between planning and rendering:
//! a serializable description of clips, transitions, outro, mixed audio and
//! overlay layers. [`Renderer`] turns it into video in three ffmpeg stages.
//!
//! # Architecture
//!
//! - **edl**: builds the EDL from the timeline, mix and layer graph
//! - **filter**: `filter_complex` graphs for joining and the final pass
//! - **commands**: ffmpeg argument lists per stage
//! - **join**: join strategies tried in order
//! - **runner**: executes ffmpeg with output captured to the run log

mod commands;
pub(crate) mod edl;
mod filter;
mod join;
mod renderer;
mod runner;
mod types;

pub use commands::RenderCommandBuilder;
pub use filter::{FilterGraph, FilterGraphBuilder};
pub use join::{
    default_join_chain, join_with_fallback, ConcatDemuxerJoin, JoinRequest, JoinStrategy,
    XfadeJoin,
};
pub use renderer::Renderer;
pub use runner::FfmpegRunner;
pub use types::{
    EdlAudio, EdlClip, EdlOverlay, EdlOverlayContent, EdlText, EdlTransition, EditDecisionList,
    RenderError, RenderOutput, RenderResult, RenderStage, EDL_VERSION,
};
