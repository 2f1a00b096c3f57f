//! Additive audio mixing.
//!
//! Every track is decoded in the common format, scaled by its
//! gain and summed. The reference track (voiceover) always plays at unity
//! gain. The sum is hard-clipped at full scale and otherwise left alone:
//! no loudness normalization is applied to the mix.

use std::path::Path;

use crate::config::AudioSettings;
use crate::models::AudioRole;

use super::format::check_format;
use super::types::{AudioTrack, LevelReport, MixError, MixOutput, MixResult, PcmBuffer};

/// Below this RMS level the mix is reported as nearly silent.
const SILENCE_RMS_DBFS: f64 = -40.0;

/// Floor used instead of negative infinity for silent buffers.
const DBFS_FLOOR: f64 = -120.0;

/// Something that turns a file into PCM.
pub trait AudioSource: Send + Sync {
    /// Decode the whole file converted to `sample_rate` and `channels`.
    fn decode(&self, path: &Path, sample_rate: u32, channels: u16) -> MixResult<PcmBuffer>;
}

/// A decoded buffer with its gain.
#[derive(Debug, Clone)]
pub struct MixInput {
    pub buffer: PcmBuffer,
    pub gain: f32,
}

/// Sum inputs into one buffer.
///
/// All inputs must share `sample_rate` and `channels`. The output is as
/// long as the longest input; shorter inputs contribute silence after
/// they end. Returns the mix and the number of samples that exceeded
/// full scale before clamping.
pub fn mix_buffers(inputs: &[MixInput], sample_rate: u32, channels: u16) -> (PcmBuffer, usize) {
    let len = inputs
        .iter()
        .map(|i| i.buffer.samples.len())
        .max()
        .unwrap_or(0);
    let mut acc = vec![0.0f32; len];

    for input in inputs {
        for (out, sample) in acc.iter_mut().zip(&input.buffer.samples) {
            *out += sample * input.gain;
        }
    }

    let mut clipped = 0;
    for sample in acc.iter_mut() {
        if sample.abs() > 1.0 {
            clipped += 1;
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    (PcmBuffer::new(acc, sample_rate, channels), clipped)
}

/// Peak and RMS of a buffer.
pub fn measure_levels(buffer: &PcmBuffer, clipped_samples: usize) -> LevelReport {
    let peak = buffer
        .samples
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    let rms = if buffer.samples.is_empty() {
        0.0
    } else {
        let sum: f64 = buffer
            .samples
            .iter()
            .map(|s| f64::from(*s) * f64::from(*s))
            .sum();
        (sum / buffer.samples.len() as f64).sqrt()
    };

    LevelReport {
        peak,
        peak_dbfs: to_dbfs(f64::from(peak)),
        rms_dbfs: to_dbfs(rms),
        clipped_samples,
    }
}

fn to_dbfs(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        DBFS_FLOOR
    } else {
        (20.0 * amplitude.log10()).max(DBFS_FLOOR)
    }
}

/// Write a buffer as 16-bit PCM WAV.
pub fn write_wav(path: &Path, buffer: &PcmBuffer) -> MixResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in &buffer.samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Mixes tracks into one file.
pub struct AudioMixer {
    source: Box<dyn AudioSource>,
    sample_rate: u32,
    channels: u16,
    reference_role: AudioRole,
}

impl AudioMixer {
    pub fn new(source: Box<dyn AudioSource>, sample_rate: u32, channels: u16) -> Self {
        Self {
            source,
            sample_rate,
            channels,
            reference_role: AudioRole::Voiceover,
        }
    }

    pub fn from_settings(source: Box<dyn AudioSource>, settings: &AudioSettings) -> Self {
        Self::new(source, settings.sample_rate, settings.channels)
    }

    /// Use a role other than voiceover as the unity-gain reference.
    pub fn with_reference_role(mut self, role: AudioRole) -> Self {
        self.reference_role = role;
        self
    }

    /// Gain a track plays at. The reference role is never attenuated.
    pub fn gain_for(&self, track: &AudioTrack) -> f32 {
        if track.role == self.reference_role {
            1.0
        } else {
            track.relative_level.max(0.0) as f32
        }
    }

    /// Decode, check and sum `tracks`, writing the mix to `output`.
    pub fn mix(&self, tracks: &[AudioTrack], output: &Path) -> MixResult<MixOutput> {
        if !tracks.iter().any(|t| t.role == self.reference_role) {
            return Err(MixError::NoReferenceTrack(self.reference_role));
        }

        let mut inputs = Vec::with_capacity(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            let unresolved = |reason: String| MixError::SampleRateMismatchUnresolved {
                index,
                role: track.role,
                reason,
            };

            let buffer = self
                .source
                .decode(&track.path, self.sample_rate, self.channels)
                .map_err(|e| unresolved(e.to_string()))?;
            tracing::debug!(
                "Track {} ({}): {} Hz, {} ch, {:.2}s",
                index,
                track.role,
                buffer.sample_rate,
                buffer.channels,
                buffer.duration()
            );
            check_format(&buffer, self.sample_rate, self.channels)
                .map_err(|e| unresolved(e.to_string()))?;

            if track.role == self.reference_role && (track.relative_level - 1.0).abs() > 1e-9 {
                tracing::warn!(
                    "Ignoring level {:.2} on {} track {}; reference plays at 1.0",
                    track.relative_level,
                    track.role,
                    index
                );
            }

            inputs.push(MixInput {
                gain: self.gain_for(track),
                buffer,
            });
        }

        let (mixed, clipped) = mix_buffers(&inputs, self.sample_rate, self.channels);
        let levels = measure_levels(&mixed, clipped);

        if levels.clipped_samples > 0 {
            tracing::warn!("Mix clipped {} samples", levels.clipped_samples);
        }
        if levels.rms_dbfs < SILENCE_RMS_DBFS {
            tracing::warn!("Mix is nearly silent ({:.1} dBFS RMS)", levels.rms_dbfs);
        }

        write_wav(output, &mixed)?;

        Ok(MixOutput {
            track: AudioTrack {
                path: output.to_path_buf(),
                role: AudioRole::Mixed,
                sample_rate: self.sample_rate,
                channels: self.channels,
                relative_level: 1.0,
            },
            duration: mixed.duration(),
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::tempdir;

    /// Serves fixed buffers by path, ignoring the requested format.
    struct MemorySource(HashMap<PathBuf, PcmBuffer>);

    impl AudioSource for MemorySource {
        fn decode(&self, path: &Path, _sample_rate: u32, _channels: u16) -> MixResult<PcmBuffer> {
            self.0.get(path).cloned().ok_or_else(|| MixError::Decode {
                path: path.display().to_string(),
                message: "unknown".to_string(),
            })
        }
    }

    fn constant(value: f32, seconds: f64, rate: u32, channels: u16) -> PcmBuffer {
        let frames = (seconds * f64::from(rate)) as usize;
        PcmBuffer::new(vec![value; frames * channels as usize], rate, channels)
    }

    fn mixer(entries: Vec<(&str, PcmBuffer)>) -> AudioMixer {
        let map = entries
            .into_iter()
            .map(|(p, b)| (PathBuf::from(p), b))
            .collect();
        AudioMixer::new(Box::new(MemorySource(map)), 48000, 2)
    }

    #[test]
    fn mix_never_attenuates_voiceover() {
        let m = mixer(vec![
            ("vo.wav", constant(0.5, 1.0, 48000, 2)),
            ("music.wav", constant(0.0, 1.0, 48000, 2)),
        ]);
        let tracks = vec![
            AudioTrack::new("vo.wav", AudioRole::Voiceover, 0.2),
            AudioTrack::new("music.wav", AudioRole::Music, 0.15),
        ];
        let dir = tempdir().unwrap();
        let out = m.mix(&tracks, &dir.path().join("mix.wav")).unwrap();

        assert!((out.levels.peak - 0.5).abs() < 1e-6);
        assert_eq!(m.gain_for(&tracks[0]), 1.0);
    }

    #[test]
    fn reference_role_can_be_changed() {
        let m = mixer(vec![("music.wav", constant(0.4, 1.0, 48000, 2))])
            .with_reference_role(AudioRole::Music);
        let tracks = vec![AudioTrack::new("music.wav", AudioRole::Music, 0.1)];
        let dir = tempdir().unwrap();
        let out = m.mix(&tracks, &dir.path().join("mix.wav")).unwrap();
        assert!((out.levels.peak - 0.4).abs() < 1e-6);

        let vo = AudioTrack::new("vo.wav", AudioRole::Voiceover, 0.3);
        assert!((m.gain_for(&vo) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn music_is_scaled_by_its_level() {
        let m = mixer(vec![
            ("vo.wav", constant(0.0, 1.0, 48000, 2)),
            ("music.wav", constant(1.0, 1.0, 48000, 2)),
        ]);
        let tracks = vec![
            AudioTrack::new("vo.wav", AudioRole::Voiceover, 1.0),
            AudioTrack::new("music.wav", AudioRole::Music, 0.15),
        ];
        let dir = tempdir().unwrap();
        let out = m.mix(&tracks, &dir.path().join("mix.wav")).unwrap();
        assert!((out.levels.peak - 0.15).abs() < 1e-6);
    }

    #[test]
    fn mix_is_written_as_stereo_48k_wav() {
        let m = mixer(vec![
            ("vo.mp3", constant(0.25, 2.0, 48000, 2)),
            ("music.mp3", constant(0.5, 1.0, 48000, 2)),
        ]);
        let tracks = vec![
            AudioTrack::new("vo.mp3", AudioRole::Voiceover, 1.0),
            AudioTrack::new("music.mp3", AudioRole::Music, 0.5),
        ];
        let dir = tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let out = m.mix(&tracks, &path).unwrap();

        assert_eq!(out.track.role, AudioRole::Mixed);
        assert_eq!(out.track.sample_rate, 48000);
        assert_eq!(out.track.channels, 2);
        assert!((out.duration - 2.0).abs() < 1e-3);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn track_left_at_another_rate_is_unresolved() {
        let m = mixer(vec![
            ("vo.mp3", constant(0.25, 1.0, 48000, 2)),
            ("music.mp3", constant(0.5, 1.0, 44100, 1)),
        ]);
        let tracks = vec![
            AudioTrack::new("vo.mp3", AudioRole::Voiceover, 1.0),
            AudioTrack::new("music.mp3", AudioRole::Music, 0.5),
        ];
        let dir = tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let err = m.mix(&tracks, &path).unwrap_err();

        match err {
            MixError::SampleRateMismatchUnresolved { index, role, reason } => {
                assert_eq!(index, 1);
                assert_eq!(role, AudioRole::Music);
                assert!(reason.contains("44100"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn overlapping_loud_tracks_clip_at_full_scale() {
        let inputs = vec![
            MixInput {
                buffer: constant(0.8, 0.01, 48000, 2),
                gain: 1.0,
            },
            MixInput {
                buffer: constant(0.8, 0.01, 48000, 2),
                gain: 1.0,
            },
        ];
        let (mixed, clipped) = mix_buffers(&inputs, 48000, 2);
        assert!(mixed.samples.iter().all(|s| *s == 1.0));
        assert_eq!(clipped, mixed.samples.len());
    }

    #[test]
    fn sum_is_not_normalized() {
        let inputs = vec![MixInput {
            buffer: constant(0.1, 0.01, 48000, 2),
            gain: 1.0,
        }];
        let (mixed, clipped) = mix_buffers(&inputs, 48000, 2);
        assert_eq!(clipped, 0);
        assert!(mixed.samples.iter().all(|s| (*s - 0.1).abs() < 1e-7));
    }

    #[test]
    fn missing_voiceover_is_rejected() {
        let m = mixer(vec![("music.wav", constant(0.1, 1.0, 48000, 2))]);
        let tracks = vec![AudioTrack::new("music.wav", AudioRole::Music, 0.15)];
        let dir = tempdir().unwrap();
        assert!(matches!(
            m.mix(&tracks, &dir.path().join("mix.wav")),
            Err(MixError::NoReferenceTrack(AudioRole::Voiceover))
        ));
    }

    #[test]
    fn undecodable_track_reports_index_and_role() {
        let m = mixer(vec![("vo.wav", constant(0.1, 1.0, 48000, 2))]);
        let tracks = vec![
            AudioTrack::new("vo.wav", AudioRole::Voiceover, 1.0),
            AudioTrack::new("sfx.wav", AudioRole::Sfx, 0.5),
        ];
        let dir = tempdir().unwrap();
        let err = m.mix(&tracks, &dir.path().join("mix.wav")).unwrap_err();
        assert!(matches!(
            err,
            MixError::SampleRateMismatchUnresolved {
                index: 1,
                role: AudioRole::Sfx,
                ..
            }
        ));
    }

    #[test]
    fn silent_buffer_reports_floor_levels() {
        let levels = measure_levels(&PcmBuffer::silence(10, 48000, 2), 0);
        assert_eq!(levels.peak, 0.0);
        assert_eq!(levels.peak_dbfs, DBFS_FLOOR);
        assert_eq!(levels.rms_dbfs, DBFS_FLOOR);
    }
}
