//! LFV Core - Backend logic for the longform video assembler
//!
//! This crate contains the narration-driven assembly pipeline with zero
//! CLI dependencies: timing, clip fitting, timeline assembly, audio mixing,
//! overlay compositing, rendering through ffmpeg, and the generation
//! request dispatcher.

pub mod audio;
pub mod config;
pub mod fitting;
pub mod generation;
pub mod logging;
pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod overlay;
pub mod probe;
pub mod render;
pub mod timeline;
pub mod timing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
