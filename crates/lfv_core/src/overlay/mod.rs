//! Overlay compositing.
//!
//! Places logos, animations and text (lower thirds, title cards) on the
//! base video with a fixed position table, timed windows and linear fades.
//! Overlays never change the length of the output.

mod compositor;
mod layout;
mod types;

pub use compositor::OverlayCompositor;
pub use layout::Layout;
pub use types::{
    BaseTrack, Layer, LayerGraph, OverlayError, OverlayPosition, OverlayResult, OverlaySource,
    OverlaySpec, Placement, TextStyle,
};
