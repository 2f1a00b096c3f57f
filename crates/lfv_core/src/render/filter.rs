//! ffmpeg filter graphs for an edit decision list.
//!
//! Fixed rules baked into every graph:
//!
//! - the base video decides the output length: overlays use
//!   `eof_action=pass` and nothing sets `shortest`
//! - the outro fades real footage to black, then `tpad` holds black
//! - overlays are trimmed to their window, retimed to start at the window
//!   and faded on the alpha channel
//! - text layers are drawn in place with `drawtext`, in the same z order,
//!   with the fade folded into the `alpha` expression

use crate::overlay::OverlayPosition;

use super::types::{EdlOverlay, EdlOverlayContent, EdlText, EditDecisionList};

/// A `filter_complex` string and the label of its video output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub graph: String,
    pub output: String,
}

/// Builds filter graphs from an EDL.
pub struct FilterGraphBuilder<'a> {
    edl: &'a EditDecisionList,
}

/// Format seconds for filter arguments.
pub(crate) fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

/// Escape a `drawtext` option value for both the option parser and the
/// filtergraph parser.
fn escape_drawtext(value: &str) -> String {
    let escape = |input: &str, special: &[char]| {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            if special.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    };
    let option_level = escape(value, &['\\', '\'', ':']);
    escape(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

impl<'a> FilterGraphBuilder<'a> {
    pub fn new(edl: &'a EditDecisionList) -> Self {
        Self { edl }
    }

    /// Scale, pad and retime a clip to the output format.
    pub fn normalize_chain(&self) -> String {
        let (w, h) = (self.edl.width, self.edl.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={},format=yuv420p",
            self.edl.frame_rate
        )
    }

    /// Join trimmed clips (inputs `0..n`) with their transitions.
    ///
    /// Cut boundaries use `concat`; everything else uses `xfade` at the
    /// offset the timeline placed the transition.
    pub fn join_graph(&self) -> FilterGraph {
        let mut parts = Vec::with_capacity(self.edl.clips.len() * 2);
        for i in 0..self.edl.clips.len() {
            parts.push(format!("[{i}:v]settb=AVTB,setpts=PTS-STARTPTS[v{i}]"));
        }

        let mut current = "v0".to_string();
        for transition in &self.edl.transitions {
            let next = format!("v{}", transition.boundary + 1);
            let out = format!("x{}", transition.boundary + 1);
            let filter = match transition.kind.xfade_name() {
                Some(name) if transition.duration > 0.0 => format!(
                    "xfade=transition={}:duration={}:offset={}",
                    name,
                    secs(transition.duration),
                    secs(transition.offset)
                ),
                _ => "concat=n=2:v=1:a=0".to_string(),
            };
            parts.push(format!("[{current}][{next}]{filter}[{out}]"));
            current = out;
        }

        FilterGraph {
            graph: parts.join(";"),
            output: current,
        }
    }

    /// Outro and overlays on top of the joined video (input 0).
    ///
    /// Overlay `k` is read from input `first_overlay_input + k`.
    pub fn final_graph(&self, first_overlay_input: usize) -> FilterGraph {
        let mut parts = Vec::with_capacity(self.edl.overlays.len() * 2 + 1);
        let base_label = if self.edl.overlays.is_empty() {
            "vout"
        } else {
            "base"
        };

        let base_chain = match self.edl.outro {
            Some(outro) => format!(
                "fade=t=out:st={}:d={}:color=black,tpad=stop_mode=add:stop_duration={}:color=black",
                secs(outro.fade_start),
                secs(outro.fade_duration),
                secs(outro.hold_duration)
            ),
            None => "null".to_string(),
        };
        parts.push(format!("[0:v]{base_chain}[{base_label}]"));

        let mut current = base_label.to_string();
        let mut next_input = first_overlay_input;
        let last = self.edl.overlays.len().saturating_sub(1);
        for (k, overlay) in self.edl.overlays.iter().enumerate() {
            let out = if k == last {
                "vout".to_string()
            } else {
                format!("c{k}")
            };

            match &overlay.content {
                EdlOverlayContent::File { .. } => {
                    let input = next_input;
                    next_input += 1;
                    parts.push(format!("[{input}:v]{}[ov{k}]", self.overlay_chain(overlay)));
                    parts.push(format!(
                        "[{current}][ov{k}]overlay=x={}:y={}:eof_action=pass:enable='between(t,{},{})'[{out}]",
                        overlay.x,
                        overlay.y,
                        secs(overlay.start),
                        secs(overlay.end)
                    ));
                }
                EdlOverlayContent::Text(text) => {
                    parts.push(format!("[{current}]{}[{out}]", text_chain(overlay, text)));
                }
            }
            current = out;
        }

        FilterGraph {
            graph: parts.join(";"),
            output: current,
        }
    }

    fn overlay_chain(&self, overlay: &EdlOverlay) -> String {
        let mut filters = vec!["format=rgba".to_string()];

        if overlay.position == OverlayPosition::Fullscreen {
            filters.push(format!("scale={}:{}", self.edl.width, self.edl.height));
        } else if (overlay.scale - 1.0).abs() > f64::EPSILON {
            filters.push(format!("scale=iw*{0}:ih*{0}", overlay.scale));
        }

        filters.push(format!("trim=duration={}", secs(overlay.duration())));
        filters.push(format!("setpts=PTS-STARTPTS+{}/TB", secs(overlay.start)));

        if overlay.fade_in > 0.0 {
            filters.push(format!(
                "fade=t=in:st={}:d={}:alpha=1",
                secs(overlay.start),
                secs(overlay.fade_in)
            ));
        }
        if overlay.fade_out > 0.0 {
            filters.push(format!(
                "fade=t=out:st={}:d={}:alpha=1",
                secs(overlay.end - overlay.fade_out),
                secs(overlay.fade_out)
            ));
        }
        if overlay.opacity < 1.0 {
            filters.push(format!("colorchannelmixer=aa={}", secs(overlay.opacity)));
        }

        filters.join(",")
    }
}

/// Alpha expression for an overlay window: linear fades times peak opacity.
fn fade_alpha(overlay: &EdlOverlay) -> String {
    let mut ramp = "1".to_string();
    if overlay.fade_in > 0.0 {
        ramp = format!(
            "min({ramp},(t-{})/{})",
            secs(overlay.start),
            secs(overlay.fade_in)
        );
    }
    if overlay.fade_out > 0.0 {
        ramp = format!(
            "min({ramp},({}-t)/{})",
            secs(overlay.end),
            secs(overlay.fade_out)
        );
    }
    format!("{}*clip({ramp},0,1)", secs(overlay.opacity))
}

/// One `drawtext` for the text line and one for the subtitle.
fn text_chain(overlay: &EdlOverlay, text: &EdlText) -> String {
    let common = |size: u32| {
        let mut opts = vec![
            "expansion=none".to_string(),
            format!("fontsize={size}"),
            format!("fontcolor={}", text.font_color),
        ];
        if let Some(font) = &text.font_file {
            opts.push(format!("fontfile={}", escape_drawtext(&font.to_string_lossy())));
        }
        if text.shadow {
            opts.push("shadowcolor=black@0.6:shadowx=2:shadowy=2".to_string());
        }
        if let Some(color) = &text.box_color {
            opts.push(format!("box=1:boxcolor={color}:boxborderw={}", size / 4));
        }
        opts.push(format!(
            "enable='between(t,{},{})'",
            secs(overlay.start),
            secs(overlay.end)
        ));
        opts.push(format!("alpha='{}'", fade_alpha(overlay)));
        opts.join(":")
    };

    let mut filters = vec![format!(
        "drawtext=text={}:x={}:y={}:{}",
        escape_drawtext(&text.text),
        overlay.x,
        overlay.y,
        common(text.font_size)
    )];
    if let Some(subtitle) = &text.subtitle {
        filters.push(format!(
            "drawtext=text={}:x={}:y={}+{}:{}",
            escape_drawtext(subtitle),
            overlay.x,
            overlay.y,
            text.font_size + text.line_gap,
            common(text.subtitle_size)
        ));
    }
    filters.join(",")
}
