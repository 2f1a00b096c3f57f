//! ffmpeg argument lists for each render stage.

use std::path::{Path, PathBuf};

use crate::config::RenderSettings;
use crate::models::MediaKind;

use super::filter::{secs, FilterGraphBuilder};
use super::types::{EdlClip, EditDecisionList};

/// Builds ffmpeg arguments from an EDL and render settings.
pub struct RenderCommandBuilder<'a> {
    edl: &'a EditDecisionList,
    settings: &'a RenderSettings,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl<'a> RenderCommandBuilder<'a> {
    pub fn new(edl: &'a EditDecisionList, settings: &'a RenderSettings) -> Self {
        Self { edl, settings }
    }

    fn video_encode(&self, args: &mut Vec<String>) {
        args.extend([
            "-c:v".to_string(),
            self.settings.video_codec.clone(),
            "-preset".to_string(),
            self.settings.preset.clone(),
            "-crf".to_string(),
            self.settings.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.edl.frame_rate.to_string(),
        ]);
    }

    /// Cut one clip to its window and normalize it. Output has no audio.
    pub fn trim(&self, clip: &EdlClip, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];

        match clip.kind {
            MediaKind::Image => {
                args.extend([
                    "-loop".to_string(),
                    "1".to_string(),
                    "-framerate".to_string(),
                    self.edl.frame_rate.to_string(),
                ]);
            }
            _ => {
                if clip.trim_start > 0.0 {
                    args.extend(["-ss".to_string(), secs(clip.trim_start)]);
                }
            }
        }

        args.extend([
            "-i".to_string(),
            path_arg(&clip.source),
            "-t".to_string(),
            secs(clip.duration),
            "-vf".to_string(),
            FilterGraphBuilder::new(self.edl).normalize_chain(),
            "-an".to_string(),
        ]);
        self.video_encode(&mut args);
        args.push(path_arg(output));
        args
    }

    /// Join trimmed clips with the transition graph.
    pub fn xfade_join(&self, inputs: &[PathBuf], output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
        for input in inputs {
            args.extend(["-i".to_string(), path_arg(input)]);
        }

        let graph = FilterGraphBuilder::new(self.edl).join_graph();
        args.extend([
            "-filter_complex".to_string(),
            graph.graph,
            "-map".to_string(),
            format!("[{}]", graph.output),
            "-an".to_string(),
        ]);
        self.video_encode(&mut args);
        args.push(path_arg(output));
        args
    }

    /// Concat demuxer list that joins clips with hard cuts at the
    /// boundaries the transitions would have used.
    pub fn concat_list(&self, inputs: &[PathBuf]) -> String {
        let durations = self.edl.cut_durations();
        let mut list = String::new();
        for (input, duration) in inputs.iter().zip(durations) {
            let escaped = path_arg(input).replace('\'', "'\\''");
            list.push_str(&format!("file '{}'\n", escaped));
            list.push_str(&format!("outpoint {}\n", secs(duration)));
        }
        list
    }

    /// Re-encode the concat list into one video.
    pub fn concat_join(&self, list_file: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            path_arg(list_file),
            "-an".to_string(),
        ];
        self.video_encode(&mut args);
        args.push(path_arg(output));
        args
    }

    /// Outro, overlays and mixed audio on top of the joined video.
    ///
    /// The output is cut to the EDL's output duration; `-shortest` is never
    /// used so no input can end the video early.
    pub fn final_pass(&self, base_video: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            path_arg(base_video),
        ];

        if let Some(audio) = &self.edl.audio {
            args.extend(["-i".to_string(), path_arg(&audio.path)]);
        }
        let first_overlay_input = if self.edl.audio.is_some() { 2 } else { 1 };

        // Text layers are drawn by the graph and take no input
        for overlay in &self.edl.overlays {
            let Some(path) = overlay.input_path() else {
                continue;
            };
            if overlay.still {
                args.extend(["-loop".to_string(), "1".to_string()]);
            } else if overlay.loops {
                args.extend(["-stream_loop".to_string(), "-1".to_string()]);
            }
            args.extend(["-i".to_string(), path_arg(path)]);
        }

        let graph = FilterGraphBuilder::new(self.edl).final_graph(first_overlay_input);
        args.extend([
            "-filter_complex".to_string(),
            graph.graph,
            "-map".to_string(),
            format!("[{}]", graph.output),
        ]);

        if self.edl.audio.is_some() {
            args.extend([
                "-map".to_string(),
                "1:a".to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                self.settings.audio_bitrate.clone(),
            ]);
        }

        self.video_encode(&mut args);
        args.extend([
            "-t".to_string(),
            secs(self.edl.output_duration),
            "-movflags".to_string(),
            "+faststart".to_string(),
            path_arg(output),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::edl::tests::sample_edl;
    use crate::render::{EdlAudio, EdlOverlayContent, EdlText};

    fn settings() -> RenderSettings {
        RenderSettings::default()
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    }

    #[test]
    fn trim_cuts_to_clip_window() {
        let mut edl = sample_edl();
        edl.clips[1].trim_start = 1.25;
        let settings = settings();
        let builder = RenderCommandBuilder::new(&edl, &settings);
        let args = builder.trim(&edl.clips[1], Path::new("/tmp/clip_001.mp4"));

        assert_eq!(window(&args, "-ss").as_deref(), Some("1.250"));
        assert_eq!(window(&args, "-t").as_deref(), Some("4.500"));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/clip_001.mp4"));
    }

    #[test]
    fn image_clip_is_looped() {
        let mut edl = sample_edl();
        edl.clips[0].kind = MediaKind::Image;
        let settings = settings();
        let args = RenderCommandBuilder::new(&edl, &settings)
            .trim(&edl.clips[0], Path::new("out.mp4"));
        assert_eq!(window(&args, "-loop").as_deref(), Some("1"));
        assert!(!args.contains(&"-ss".to_string()));
    }

    #[test]
    fn concat_list_uses_cut_points() {
        let edl = sample_edl();
        let settings = settings();
        let inputs: Vec<PathBuf> = (0..3).map(|i| PathBuf::from(format!("/w/c{}.mp4", i))).collect();
        let list = RenderCommandBuilder::new(&edl, &settings).concat_list(&inputs);
        assert_eq!(
            list,
            "file '/w/c0.mp4'\noutpoint 4.000\nfile '/w/c1.mp4'\noutpoint 4.000\nfile '/w/c2.mp4'\noutpoint 4.000\n"
        );
    }

    #[test]
    fn final_pass_maps_audio_and_limits_duration() {
        let mut edl = sample_edl();
        edl.audio = Some(EdlAudio {
            path: PathBuf::from("/w/mix.wav"),
            duration: 12.0,
        });
        let settings = settings();
        let args = RenderCommandBuilder::new(&edl, &settings)
            .final_pass(Path::new("/w/joined.mp4"), Path::new("/out/final.mp4"));

        assert_eq!(window(&args, "-t").as_deref(), Some("12.000"));
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"1:a".to_string()));
        assert_eq!(window(&args, "-loop").as_deref(), Some("1"));
        let graph = window(&args, "-filter_complex").unwrap_or_default();
        assert!(graph.contains("[2:v]format=rgba"));
    }

    #[test]
    fn looping_overlay_uses_stream_loop() {
        let mut edl = sample_edl();
        edl.overlays[0].still = false;
        edl.overlays[0].loops = true;
        let settings = settings();
        let args = RenderCommandBuilder::new(&edl, &settings)
            .final_pass(Path::new("joined.mp4"), Path::new("final.mp4"));
        assert_eq!(window(&args, "-stream_loop").as_deref(), Some("-1"));
    }

    #[test]
    fn text_overlay_adds_no_input() {
        let mut edl = sample_edl();
        let mut text = edl.overlays[0].clone();
        text.content = EdlOverlayContent::Text(EdlText {
            text: "The End".to_string(),
            subtitle: None,
            font_size: 48,
            subtitle_size: 32,
            line_gap: 5,
            font_color: "white".to_string(),
            font_file: None,
            box_color: None,
            shadow: false,
        });
        edl.overlays = vec![text];
        let settings = settings();
        let args = RenderCommandBuilder::new(&edl, &settings)
            .final_pass(Path::new("joined.mp4"), Path::new("final.mp4"));

        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
        assert!(!args.contains(&"-loop".to_string()));
        let graph = window(&args, "-filter_complex").unwrap_or_default();
        assert!(graph.contains("[base]drawtext=text=The End"));
    }
}
