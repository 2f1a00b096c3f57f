//! Settings struct with TOML-based sections.
//!
//! Settings are organized into one section per pipeline stage. Each
//! section maps to a TOML table and can be updated independently.

use serde::{Deserialize, Serialize};

use crate::models::{TransitionKind, TrimAnchor};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Narration segmentation.
    #[serde(default)]
    pub timing: TimingSettings,

    /// Clip fitting.
    #[serde(default)]
    pub fitting: FittingSettings,

    /// Timeline assembly (transitions, outro).
    #[serde(default)]
    pub timeline: TimelineSettings,

    /// Audio mixing levels and format.
    #[serde(default)]
    pub audio: AudioSettings,

    /// Overlay layout.
    #[serde(default)]
    pub overlay: OverlaySettings,

    /// ffmpeg encoding.
    #[serde(default)]
    pub render: RenderSettings,

    /// Generation service dispatch.
    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for finished videos.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-run working directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "lfv_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of error lines to show in tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log every ffmpeg argument list in pretty form.
    #[serde(default)]
    pub show_commands_pretty: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_commands_pretty: false,
        }
    }
}

/// Narration segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Silence (seconds) between words that ends a segment.
    #[serde(default = "default_pause_threshold")]
    pub pause_threshold: f64,

    /// Segments with less speech than this are merged into a neighbour.
    #[serde(default = "default_min_fragment")]
    pub min_fragment: f64,

    /// Also break at commas, semicolons and colons.
    #[serde(default)]
    pub clause_breaks: bool,

    /// Stretch segments so they tile the narration without gaps.
    #[serde(default = "default_true")]
    pub close_gaps: bool,
}

fn default_pause_threshold() -> f64 {
    0.6
}

fn default_min_fragment() -> f64 {
    1.0
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            pause_threshold: default_pause_threshold(),
            min_fragment: default_min_fragment(),
            clause_breaks: false,
            close_gaps: true,
        }
    }
}

/// Clip fitting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittingSettings {
    /// Shortest clip (seconds) allowed on the timeline.
    #[serde(default = "default_min_clip_duration")]
    pub min_clip_duration: f64,

    /// Which part of an over-long clip is kept.
    #[serde(default)]
    pub trim_anchor: TrimAnchor,

    /// Merge segments shorter than the minimum before fitting.
    #[serde(default = "default_true")]
    pub merge_short_segments: bool,
}

fn default_min_clip_duration() -> f64 {
    2.5
}

impl Default for FittingSettings {
    fn default() -> Self {
        Self {
            min_clip_duration: default_min_clip_duration(),
            trim_anchor: TrimAnchor::Start,
            merge_short_segments: true,
        }
    }
}

/// Timeline assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineSettings {
    /// Output frame rate. One frame interval is the reconciliation tolerance.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Transition used between every pair of clips.
    #[serde(default)]
    pub transition_kind: TransitionKind,

    /// Transition length in seconds.
    #[serde(default = "default_transition_duration")]
    pub transition_duration: f64,

    /// Fade-to-black length of the outro.
    #[serde(default = "default_outro_fade")]
    pub outro_fade_duration: f64,
}

fn default_frame_rate() -> u32 {
    24
}

fn default_transition_duration() -> f64 {
    0.5
}

fn default_outro_fade() -> f64 {
    1.5
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            transition_kind: TransitionKind::Crossfade,
            transition_duration: default_transition_duration(),
            outro_fade_duration: default_outro_fade(),
        }
    }
}

/// Audio mixing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Common sample rate of the mix.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Common channel count of the mix.
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Linear gain of the voiceover. Values below 1.0 are ignored.
    #[serde(default = "default_voiceover_level")]
    pub voiceover_level: f64,

    /// Linear gain of background music.
    #[serde(default = "default_music_level")]
    pub music_level: f64,

    /// Linear gain of sound effects.
    #[serde(default = "default_sfx_level")]
    pub sfx_level: f64,

    /// Use SOXR high-quality resampling via FFmpeg when decoding tracks.
    #[serde(default = "default_true")]
    pub use_soxr: bool,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> u16 {
    2
}

fn default_voiceover_level() -> f64 {
    1.0
}

fn default_music_level() -> f64 {
    0.15
}

fn default_sfx_level() -> f64 {
    0.5
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            voiceover_level: default_voiceover_level(),
            music_level: default_music_level(),
            sfx_level: default_sfx_level(),
            use_soxr: true,
        }
    }
}

/// Overlay layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Margin from the frame edge as a fraction of width/height.
    #[serde(default = "default_safe_margin")]
    pub safe_margin: f64,

    /// Distance of the lower-third baseline from the bottom, as a fraction of height.
    #[serde(default = "default_lower_third_offset")]
    pub lower_third_offset: f64,
}

fn default_safe_margin() -> f64 {
    0.05
}

fn default_lower_third_offset() -> f64 {
    0.15
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            safe_margin: default_safe_margin(),
            lower_third_offset: default_lower_third_offset(),
        }
    }
}

/// Render (ffmpeg) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// ffmpeg executable.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// ffprobe executable.
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Video encoder.
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoder preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor.
    #[serde(default = "default_crf")]
    pub crf: u32,

    /// AAC bitrate of the final mux.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_crf() -> u32 {
    23
}

fn default_audio_bitrate() -> String {
    "256k".to_string()
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            width: default_width(),
            height: default_height(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

/// Generation service dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Base URL of the generation gateway.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Requests in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per request before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in seconds, doubled on each retry.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,

    /// Backoff ceiling in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: f64,
}

fn default_base_url() -> String {
    "https://queue.fal.run".to_string()
}

fn default_api_key_env() -> String {
    "FAL_KEY".to_string()
}

fn default_max_concurrent() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_request_timeout() -> f64 {
    600.0
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Config sections for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Timing,
    Fitting,
    Timeline,
    Audio,
    Overlay,
    Render,
    Generation,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 9] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Timing,
        ConfigSection::Fitting,
        ConfigSection::Timeline,
        ConfigSection::Audio,
        ConfigSection::Overlay,
        ConfigSection::Render,
        ConfigSection::Generation,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Timing => "timing",
            ConfigSection::Fitting => "fitting",
            ConfigSection::Timeline => "timeline",
            ConfigSection::Audio => "audio",
            ConfigSection::Overlay => "overlay",
            ConfigSection::Render => "render",
            ConfigSection::Generation => "generation",
        }
    }

    /// Comment written above the table.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Timing => "Narration segmentation",
            ConfigSection::Fitting => "Clip fitting (minimum length, trim anchor)",
            ConfigSection::Timeline => "Transitions and outro",
            ConfigSection::Audio => "Mix format and track levels",
            ConfigSection::Overlay => "Overlay layout",
            ConfigSection::Render => "ffmpeg encoding",
            ConfigSection::Generation => "Generation service dispatch",
        }
    }
}
