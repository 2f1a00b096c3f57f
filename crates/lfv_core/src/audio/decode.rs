//! Decoding audio files to PCM with ffmpeg.
//!
//! ffmpeg resamples and remixes every track to the mix format while
//! decoding (SOXR when enabled) and pipes raw 32-bit float samples back.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::config::AudioSettings;
use crate::probe::MediaProbe;

use super::mixer::AudioSource;
use super::types::{MixError, MixResult, PcmBuffer};

/// Decodes files through ffprobe + ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegAudioSource {
    ffmpeg: String,
    probe: MediaProbe,
    use_soxr: bool,
}

impl FfmpegAudioSource {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            probe: MediaProbe::new(ffprobe),
            use_soxr: true,
        }
    }

    pub fn from_settings(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        settings: &AudioSettings,
    ) -> Self {
        Self::new(ffmpeg, ffprobe).with_soxr(settings.use_soxr)
    }

    /// Choose between the SOXR resampler and ffmpeg's default.
    pub fn with_soxr(mut self, use_soxr: bool) -> Self {
        self.use_soxr = use_soxr;
        self
    }

    /// ffmpeg arguments that decode `path` at `sample_rate` and `channels`.
    fn decode_args(&self, path: &Path, sample_rate: u32, channels: u16) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-i".into(),
            path.into(),
            "-vn".into(),
            "-ac".into(),
            channels.to_string().into(),
            "-ar".into(),
            sample_rate.to_string().into(),
        ];

        if self.use_soxr {
            args.push("-resampler".into());
            args.push("soxr".into());
        }

        args.extend(
            ["-f", "f32le", "-acodec", "pcm_f32le", "pipe:1"]
                .iter()
                .map(OsString::from),
        );
        args
    }
}

impl AudioSource for FfmpegAudioSource {
    fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> MixResult<PcmBuffer> {
        let decode_error = |message: String| MixError::Decode {
            path: path.display().to_string(),
            message,
        };

        // Fails fast on files without an audio stream
        let info = self
            .probe
            .audio_stream(path)
            .map_err(|e| decode_error(e.to_string()))?;
        if info.sample_rate != sample_rate || info.channels != channels {
            tracing::debug!(
                "Converting {} from {} Hz, {} ch to {} Hz, {} ch",
                path.display(),
                info.sample_rate,
                info.channels,
                sample_rate,
                channels
            );
        }

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(self.decode_args(path, sample_rate, channels));
        cmd.stderr(Stdio::null()).stdout(Stdio::piped());

        tracing::debug!("Running FFmpeg: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| decode_error(format!("failed to spawn ffmpeg: {}", e)))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| decode_error("failed to capture ffmpeg stdout".to_string()))?;

        let mut bytes = Vec::new();
        stdout
            .read_to_end(&mut bytes)
            .map_err(|e| decode_error(format!("failed to read ffmpeg output: {}", e)))?;

        let status = child
            .wait()
            .map_err(|e| decode_error(format!("ffmpeg process error: {}", e)))?;
        if !status.success() {
            return Err(decode_error(format!(
                "ffmpeg exited with code {:?}",
                status.code()
            )));
        }

        let samples = bytes_to_f32_samples(&bytes);
        if samples.is_empty() {
            return Err(decode_error("no audio samples decoded".to_string()));
        }

        Ok(PcmBuffer::new(samples, sample_rate, channels))
    }
}

/// Convert raw little-endian bytes to f32 samples. A trailing partial sample is dropped.
fn bytes_to_f32_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(source: &FfmpegAudioSource) -> Vec<String> {
        source
            .decode_args(Path::new("vo.mp3"), 48000, 2)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn bytes_to_samples_converts_correctly() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        bytes.push(0xff);

        let samples = bytes_to_f32_samples(&bytes);
        assert_eq!(samples, vec![0.5, -0.25]);
    }

    #[test]
    fn ffmpeg_converts_to_mix_format_with_soxr() {
        let args = args_of(&FfmpegAudioSource::new("ffmpeg", "ffprobe"));
        assert_eq!(value_after(&args, "-ar").as_deref(), Some("48000"));
        assert_eq!(value_after(&args, "-ac").as_deref(), Some("2"));
        assert_eq!(value_after(&args, "-resampler").as_deref(), Some("soxr"));

        // Output options come before the pipe target
        let ar = args.iter().position(|a| a == "-ar").unwrap();
        let input = args.iter().position(|a| a == "vo.mp3").unwrap();
        assert!(input < ar);
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn soxr_can_be_disabled_from_settings() {
        let settings = AudioSettings {
            use_soxr: false,
            ..AudioSettings::default()
        };
        let args = args_of(&FfmpegAudioSource::from_settings("ffmpeg", "ffprobe", &settings));
        assert!(!args.iter().any(|a| a == "-resampler"));
        assert_eq!(value_after(&args, "-ar").as_deref(), Some("48000"));
    }

    #[test]
    fn missing_file_fails_to_decode() {
        let source = FfmpegAudioSource::new("ffmpeg", "ffprobe");
        assert!(matches!(
            source.decode(Path::new("/nonexistent/vo.mp3"), 48000, 2),
            Err(MixError::Decode { .. })
        ));
    }
}
