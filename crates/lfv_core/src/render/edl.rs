//! Building, saving and loading edit decision lists.

use std::fs;
use std::path::Path;

use crate::audio::MixOutput;
use crate::overlay::{LayerGraph, Layout, OverlaySource, TextStyle};
use crate::timeline::Timeline;

use super::types::{
    EdlAudio, EdlClip, EdlOverlay, EdlOverlayContent, EdlText, EdlTransition, EditDecisionList,
    RenderError, RenderResult, EDL_VERSION,
};

/// Default text sizes as fractions of the frame height.
const TEXT_SIZE: f64 = 0.05;
const SUBTITLE_SIZE: f64 = 0.033;

/// Resolve a text source against the frame height and overlay scale.
fn resolve_text(
    text: &str,
    subtitle: Option<&str>,
    style: &TextStyle,
    scale: f64,
    frame_h: u32,
) -> EdlText {
    let sized = |explicit: Option<u32>, fraction: f64| {
        let base = explicit
            .map(f64::from)
            .unwrap_or(f64::from(frame_h) * fraction);
        (base * scale).round().max(1.0) as u32
    };
    let font_size = sized(style.font_size, TEXT_SIZE);

    EdlText {
        text: text.to_string(),
        subtitle: subtitle.map(str::to_string),
        font_size,
        subtitle_size: sized(style.subtitle_size, SUBTITLE_SIZE),
        line_gap: (f64::from(font_size) * 0.1).round() as u32,
        font_color: style
            .font_color
            .clone()
            .unwrap_or_else(|| "white".to_string()),
        font_file: style.font_file.clone(),
        box_color: style.box_color.clone(),
        shadow: style.shadow,
    }
}

impl EditDecisionList {
    /// Flatten the timeline, mix and overlay layers into one render plan.
    pub fn build(
        timeline: &Timeline,
        mix: Option<&MixOutput>,
        layers: Option<&LayerGraph>,
        layout: &Layout,
        frame: (u32, u32),
    ) -> Self {
        let clips = timeline
            .entries
            .iter()
            .map(|entry| EdlClip {
                index: entry.index,
                source: entry.clip.source.path.clone(),
                kind: entry.clip.source.kind(),
                trim_start: entry.clip.trim_start,
                trim_end: entry.clip.trim_end,
                timeline_start: entry.timeline_start,
                duration: entry.duration(),
            })
            .collect();

        let transitions = timeline
            .entries
            .iter()
            .filter_map(|entry| {
                entry.transition_in.map(|t| EdlTransition {
                    boundary: entry.index.saturating_sub(1),
                    kind: t.kind,
                    duration: t.overlap(),
                    offset: entry.timeline_start,
                })
            })
            .collect();

        let audio = mix.map(|m| EdlAudio {
            path: m.track.path.clone(),
            duration: m.duration,
        });

        let overlays = layers
            .map(|graph| {
                graph
                    .layers
                    .iter()
                    .map(|layer| {
                        let spec = &layer.spec;
                        let offset = (spec.x_offset, spec.y_offset);
                        let (content, (x, y)) = match &spec.source {
                            OverlaySource::File(path) => (
                                EdlOverlayContent::File { path: path.clone() },
                                layout.overlay_expressions(spec.position, frame, offset),
                            ),
                            OverlaySource::Text {
                                text,
                                subtitle,
                                style,
                            } => {
                                let text = resolve_text(
                                    text,
                                    subtitle.as_deref(),
                                    style,
                                    spec.scale,
                                    frame.1,
                                );
                                let xy = layout.text_expressions(
                                    spec.position,
                                    frame,
                                    offset,
                                    text.block_height(),
                                );
                                (EdlOverlayContent::Text(text), xy)
                            }
                        };
                        EdlOverlay {
                            z: layer.z,
                            content,
                            position: spec.position,
                            start: layer.window_start,
                            end: layer.window_end,
                            fade_in: layer.fade_in,
                            fade_out: layer.fade_out,
                            scale: spec.scale,
                            opacity: spec.opacity,
                            x,
                            y,
                            loops: layer.loops,
                            still: layer.still,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            version: EDL_VERSION,
            width: frame.0,
            height: frame.1,
            frame_rate: timeline.frame_rate,
            output_duration: timeline.total_duration(),
            clips,
            transitions,
            outro: timeline.outro,
            audio,
            overlays,
        }
    }

    /// Basic consistency checks before rendering.
    pub fn validate(&self) -> RenderResult<()> {
        if self.clips.is_empty() {
            return Err(RenderError::InvalidEdl("no clips".to_string()));
        }
        if self.transitions.len() + 1 != self.clips.len() {
            return Err(RenderError::InvalidEdl(format!(
                "{} transitions for {} clips",
                self.transitions.len(),
                self.clips.len()
            )));
        }
        if let Some(clip) = self.clips.iter().find(|c| !(c.duration > 0.0)) {
            return Err(RenderError::InvalidEdl(format!(
                "clip {} has non-positive duration {}",
                clip.index, clip.duration
            )));
        }
        if !(self.output_duration > 0.0) {
            return Err(RenderError::InvalidEdl(format!(
                "output duration {} is not positive",
                self.output_duration
            )));
        }
        Ok(())
    }

    /// Write as pretty JSON. Writes to a temp file first, then renames.
    pub fn save(&self, path: &Path) -> RenderResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RenderError::io("creating EDL directory", e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| RenderError::io("writing EDL", e))?;
        fs::rename(&temp_path, path).map_err(|e| RenderError::io("renaming EDL", e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> RenderResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| RenderError::io("reading EDL", e))?;
        let edl: Self = serde_json::from_str(&content)?;
        if edl.version > EDL_VERSION {
            return Err(RenderError::InvalidEdl(format!(
                "unsupported EDL version {}",
                edl.version
            )));
        }
        Ok(edl)
    }
}
