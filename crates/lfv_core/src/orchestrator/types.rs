//! Core types for the orchestrator pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::{AudioTrack, MixOutput};
use crate::config::Settings;
use crate::fitting::FitReport;
use crate::logging::RunLogger;
use crate::manifest::RunManifest;
use crate::models::AudioRole;
use crate::overlay::{LayerGraph, OverlaySpec};
use crate::probe::MediaProbe;
use crate::render::RenderOutput;
use crate::timeline::{Timeline, TransitionPlan, TransitionSpec};
use crate::timing::{CharacterAlignment, SegmentationOutcome, WordTiming};

use super::errors::StepResult;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// One scene: the narration it covers and the clip shown over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    #[serde(default)]
    pub text: String,
    pub clip: PathBuf,
}

/// A music or effects bed for the mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub path: PathBuf,
    pub role: AudioRole,
    /// Linear gain; the configured level for the role when absent.
    #[serde(default)]
    pub level: Option<f64>,
}

/// Everything needed to assemble one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub name: String,
    /// The voiceover. Its length is the length of the video.
    pub narration: PathBuf,
    /// Word or character timings for the voiceover, as JSON.
    #[serde(default)]
    pub alignment: Option<PathBuf>,
    pub scenes: Vec<SceneSpec>,
    /// Transitions between scenes; the configured default when absent.
    #[serde(default)]
    pub transitions: Option<TransitionPlan>,
    #[serde(default)]
    pub tracks: Vec<TrackSpec>,
    #[serde(default)]
    pub overlays: Vec<OverlaySpec>,
    /// File name of the finished video; `<name>.mp4` when absent.
    #[serde(default)]
    pub output_name: Option<String>,
}

impl RunSpec {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Problems that make the spec unusable, before anything runs.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("run name is empty".to_string());
        }
        if self.scenes.is_empty() {
            return Err("no scenes".to_string());
        }
        if let Some(track) = self
            .tracks
            .iter()
            .find(|t| matches!(t.role, AudioRole::Voiceover | AudioRole::Mixed))
        {
            return Err(format!(
                "track {} has role {}; only music and sfx may be added",
                track.path.display(),
                track.role
            ));
        }
        Ok(())
    }

    pub fn scene_texts(&self) -> Vec<String> {
        self.scenes.iter().map(|s| s.text.clone()).collect()
    }
}

/// Alignment file contents: word timings or raw character timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlignmentFile {
    Words(Vec<WordTiming>),
    Characters(CharacterAlignment),
}

/// Read-only context passed to pipeline steps.
///
/// Contains the run spec and shared resources that steps can read
/// but not modify. Mutable state goes in `RunState`.
pub struct RunContext {
    pub spec: RunSpec,
    pub settings: Settings,
    pub run_name: String,
    /// Run-specific working directory (under temp_root).
    pub work_dir: PathBuf,
    /// Output directory for the finished video.
    pub output_dir: PathBuf,
    pub logger: Arc<RunLogger>,
    progress_callback: Option<ProgressCallback>,
}

impl RunContext {
    pub fn new(
        spec: RunSpec,
        settings: Settings,
        run_name: impl Into<String>,
        work_dir: PathBuf,
        output_dir: PathBuf,
        logger: Arc<RunLogger>,
    ) -> Self {
        Self {
            spec,
            settings,
            run_name: run_name.into(),
            work_dir,
            output_dir,
            logger,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    pub fn probe(&self) -> MediaProbe {
        MediaProbe::new(self.settings.render.ffprobe_path.clone())
    }

    /// The run's transitions, falling back to the configured default.
    pub fn transition_plan(&self) -> TransitionPlan {
        self.spec.transitions.clone().unwrap_or_else(|| {
            let timeline = &self.settings.timeline;
            TransitionPlan::Uniform(TransitionSpec::new(
                timeline.transition_kind,
                timeline.transition_duration,
            ))
        })
    }

    /// Level for a music or effects track.
    pub fn track_level(&self, track: &TrackSpec) -> f64 {
        track.level.unwrap_or(match track.role {
            AudioRole::Music => self.settings.audio.music_level,
            AudioRole::Sfx => self.settings.audio.sfx_level,
            AudioRole::Voiceover | AudioRole::Mixed => self.settings.audio.voiceover_level,
        })
    }

    /// Mixer input: the voiceover first, then every extra track.
    pub fn audio_tracks(&self) -> Vec<AudioTrack> {
        let mut tracks = vec![AudioTrack::new(
            &self.spec.narration,
            AudioRole::Voiceover,
            self.settings.audio.voiceover_level,
        )];
        tracks.extend(
            self.spec
                .tracks
                .iter()
                .map(|t| AudioTrack::new(&t.path, t.role, self.track_level(t))),
        );
        tracks
    }

    pub fn output_path(&self) -> PathBuf {
        let name = self
            .spec
            .output_name
            .clone()
            .unwrap_or_else(|| format!("{}.mp4", self.run_name));
        self.output_dir.join(name)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.work_dir.join("manifest.json")
    }
}

/// Output from the Segment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutput {
    /// Probed length of the voiceover.
    pub narration_duration: f64,
    pub outcome: SegmentationOutcome,
    /// Segments were merged to reach the minimum clip length.
    pub merged: bool,
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Write-once: steps add their own section and never overwrite another's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<MixOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layers: Option<LayerGraph>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderOutput>,
    /// Artifact record for the run, if one is kept on disk.
    #[serde(skip)]
    pub manifest: Option<RunManifest>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn with_manifest(mut self, manifest: RunManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    /// Record an artifact in the manifest, if there is one.
    pub fn record(
        &mut self,
        stage: &str,
        index: Option<usize>,
        params: Value,
        output: impl Into<PathBuf>,
    ) -> StepResult<()> {
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.record(stage, index, params, output)?;
        }
        Ok(())
    }

    pub fn complete_stage(&mut self, stage: &str) -> StepResult<()> {
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.complete_stage(stage)?;
        }
        Ok(())
    }

    pub fn has_segments(&self) -> bool {
        self.segments.is_some()
    }

    pub fn has_timeline(&self) -> bool {
        self.timeline.is_some()
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (nothing to do, but not an error).
    Skipped(String),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logging::RunLoggerBuilder;
    use std::path::Path;

    pub(crate) fn sample_spec() -> RunSpec {
        RunSpec {
            name: "harbor".to_string(),
            narration: PathBuf::from("narration.mp3"),
            alignment: None,
            scenes: vec![
                SceneSpec {
                    text: "The harbor wakes.".to_string(),
                    clip: PathBuf::from("scene_0.mp4"),
                },
                SceneSpec {
                    text: "Boats head out.".to_string(),
                    clip: PathBuf::from("scene_1.mp4"),
                },
            ],
            transitions: None,
            tracks: vec![TrackSpec {
                path: PathBuf::from("music.mp3"),
                role: AudioRole::Music,
                level: None,
            }],
            overlays: Vec::new(),
            output_name: None,
        }
    }

    pub(crate) fn context_in(dir: &Path, spec: RunSpec) -> RunContext {
        let logger = RunLoggerBuilder::new(&spec.name, dir).build().unwrap();
        RunContext::new(
            spec,
            Settings::default(),
            "harbor",
            dir.join("work"),
            dir.join("out"),
            Arc::new(logger),
        )
    }

    #[test]
    fn run_spec_parses_with_defaults() {
        let spec = RunSpec::from_json(
            r#"{
                "name": "harbor",
                "narration": "vo.mp3",
                "scenes": [{"text": "Dawn.", "clip": "a.mp4"}],
                "tracks": [{"path": "bed.mp3", "role": "music"}]
            }"#,
        )
        .unwrap();
        assert!(spec.transitions.is_none());
        assert!(spec.overlays.is_empty());
        assert_eq!(spec.tracks[0].level, None);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn extra_voiceover_track_is_rejected() {
        let mut spec = sample_spec();
        spec.tracks.push(TrackSpec {
            path: PathBuf::from("other_vo.mp3"),
            role: AudioRole::Voiceover,
            level: None,
        });
        assert!(spec.validate().unwrap_err().contains("voiceover"));
    }

    #[test]
    fn audio_tracks_lead_with_voiceover_at_configured_levels() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_in(dir.path(), sample_spec());
        let tracks = ctx.audio_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].role, AudioRole::Voiceover);
        assert_eq!(tracks[0].relative_level, 1.0);
        assert_eq!(tracks[1].relative_level, 0.15);
        assert_eq!(ctx.output_path(), dir.path().join("out").join("harbor.mp4"));
    }

    #[test]
    fn alignment_file_accepts_both_shapes() {
        let words: AlignmentFile =
            serde_json::from_str(r#"[{"text": "Hi", "start": 0.0, "end": 0.3}]"#).unwrap();
        assert!(matches!(words, AlignmentFile::Words(ref w) if w.len() == 1));

        let chars: AlignmentFile = serde_json::from_str(
            r#"{"characters": ["H", "i"],
                "character_start_times_seconds": [0.0, 0.1],
                "character_end_times_seconds": [0.1, 0.2]}"#,
        )
        .unwrap();
        assert!(matches!(chars, AlignmentFile::Characters(_)));
    }

    #[test]
    fn run_state_serializes() {
        let state = RunState::new("run-456");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"run_id\":\"run-456\""));
        assert!(!json.contains("manifest"));
    }
}
