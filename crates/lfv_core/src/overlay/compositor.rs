//! Resolving overlay specs against a base track.
//!
//! The base track always decides the output length. Overlays that end
//! early simply stop drawing; overlays that run past the end are either
//! rejected or, with `run_to_end`, cut at the end of the base track.

use super::types::{
    BaseTrack, Layer, LayerGraph, OverlayError, OverlayResult, OverlaySource, OverlaySpec,
};

/// Tolerance for windows that end a hair past the base track.
const WINDOW_EPSILON: f64 = 1e-6;

/// Builds layer graphs.
#[derive(Debug, Clone, Default)]
pub struct OverlayCompositor;

impl OverlayCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Validate `overlays` and stack them on `base` in declaration order.
    pub fn composite(&self, base: &BaseTrack, overlays: &[OverlaySpec]) -> OverlayResult<LayerGraph> {
        if !base.duration.is_finite() || base.duration <= 0.0 {
            return Err(OverlayError::InvalidOverlay {
                index: 0,
                reason: format!("base track duration {} is not positive", base.duration),
            });
        }

        let layers = overlays
            .iter()
            .enumerate()
            .map(|(index, spec)| resolve_layer(base, index, spec))
            .collect::<OverlayResult<Vec<_>>>()?;

        tracing::debug!(
            "Composited {} overlays on {:.2}s base track",
            layers.len(),
            base.duration
        );
        Ok(LayerGraph { base: *base, layers })
    }
}

fn resolve_layer(base: &BaseTrack, index: usize, spec: &OverlaySpec) -> OverlayResult<Layer> {
    let invalid = |reason: &str| OverlayError::InvalidOverlay {
        index,
        reason: reason.to_string(),
    };

    if !spec.start_time.is_finite() || spec.start_time < 0.0 {
        return Err(invalid("start time must be a non-negative number"));
    }
    if !spec.duration.is_finite() || spec.duration <= 0.0 {
        return Err(invalid("duration must be positive"));
    }
    if !(spec.fade_in >= 0.0 && spec.fade_out >= 0.0) {
        return Err(invalid("fades must be non-negative"));
    }
    if !(spec.scale > 0.0) {
        return Err(invalid("scale must be positive"));
    }
    if !(0.0..=1.0).contains(&spec.opacity) {
        return Err(invalid("opacity must be between 0 and 1"));
    }
    if let OverlaySource::Text { text, .. } = &spec.source {
        if text.trim().is_empty() {
            return Err(invalid("text overlay has no text"));
        }
        if spec.native_duration.is_some() {
            return Err(invalid("text overlays have no native duration"));
        }
    }
    if spec.fade_in + spec.fade_out > spec.duration + WINDOW_EPSILON {
        return Err(OverlayError::InvalidFades {
            index,
            fade_in: spec.fade_in,
            fade_out: spec.fade_out,
            duration: spec.duration,
        });
    }

    let start = spec.start_time;
    let requested_end = spec.end_time();
    let out_of_range = || OverlayError::WindowOutOfRange {
        index,
        start,
        end: requested_end,
        base_duration: base.duration,
    };

    if start >= base.duration {
        return Err(out_of_range());
    }

    let (end, fade_out) = if requested_end > base.duration + WINDOW_EPSILON {
        if !spec.run_to_end {
            return Err(out_of_range());
        }
        // Keep the fade-out inside the shortened window
        let window = base.duration - start;
        (base.duration, spec.fade_out.min((window - spec.fade_in).max(0.0)))
    } else {
        (requested_end.min(base.duration), spec.fade_out)
    };

    let window = end - start;
    let (loops, still) = match spec.native_duration {
        None => (false, true),
        Some(native) if native.is_finite() && native > 0.0 => (native + WINDOW_EPSILON < window, false),
        Some(_) => return Err(invalid("native duration must be positive")),
    };

    Ok(Layer {
        z: index,
        spec: spec.clone(),
        window_start: start,
        window_end: end,
        fade_in: spec.fade_in.min(window),
        fade_out,
        loops,
        still,
    })
}
