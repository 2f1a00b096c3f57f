//! Audio mixing.
//!
//! Voiceover, music and sound effects are decoded by ffmpeg at one sample
//! rate and channel layout, mixed at their configured levels with the
//! voiceover at unity gain, and written as a single WAV file.

mod decode;
mod format;
mod mixer;
mod types;

pub use decode::FfmpegAudioSource;
pub use mixer::{measure_levels, mix_buffers, write_wav, AudioMixer, AudioSource, MixInput};
pub use format::check_format;
pub use types::{AudioTrack, LevelReport, MixError, MixOutput, MixResult, PcmBuffer};
