//! Fitting source clips to narration segments.
//!
//! Over-long clips are trimmed to the segment length. Short clips are used
//! in full and the missing time is reported as a deficit. Clips are never
//! looped and frames are never frozen.

use crate::config::FittingSettings;
use crate::models::{SourceClip, TrimAnchor};
use crate::timing::NarrationSegment;

use super::types::{FitError, FitReport, FitResult, FittedClip};

/// Shortest clip allowed on the timeline by default.
pub const MIN_CLIP_DURATION: f64 = 2.5;

/// Fits clips to target durations.
#[derive(Debug, Clone)]
pub struct ClipFitter {
    min_duration: f64,
    anchor: TrimAnchor,
}

impl Default for ClipFitter {
    fn default() -> Self {
        Self::new(MIN_CLIP_DURATION, TrimAnchor::Start)
    }
}

impl ClipFitter {
    pub fn new(min_duration: f64, anchor: TrimAnchor) -> Self {
        Self {
            min_duration,
            anchor,
        }
    }

    pub fn from_settings(settings: &FittingSettings) -> Self {
        Self::new(settings.min_clip_duration, settings.trim_anchor)
    }

    /// Minimum clip duration in seconds.
    pub fn min_duration(&self) -> f64 {
        self.min_duration
    }

    /// Fit one clip to `target_duration` seconds.
    ///
    /// Errors carry no index; use [`FitError::at`] to attach one.
    pub fn fit(&self, clip: &SourceClip, target_duration: f64) -> FitResult<FittedClip> {
        if !target_duration.is_finite() || target_duration <= 0.0 {
            return Err(FitError::InvalidDuration {
                index: None,
                value: target_duration,
            });
        }
        let native = clip.native_duration;
        if !native.is_finite() || native < 0.0 {
            return Err(FitError::InvalidDuration {
                index: None,
                value: native,
            });
        }
        if target_duration < self.min_duration {
            return Err(FitError::ClipTooShort {
                index: None,
                duration: target_duration,
                minimum: self.min_duration,
            });
        }
        if native < self.min_duration {
            return Err(FitError::ClipTooShort {
                index: None,
                duration: native,
                minimum: self.min_duration,
            });
        }

        let fitted = if native >= target_duration {
            let trim_start = match self.anchor {
                TrimAnchor::Start => 0.0,
                TrimAnchor::Center => (native - target_duration) / 2.0,
            };
            FittedClip {
                source: clip.clone(),
                trim_start,
                trim_end: trim_start + target_duration,
                target_duration,
                requested_duration: target_duration,
            }
        } else {
            tracing::debug!(
                "{} is {:.2}s short of its {:.2}s segment",
                clip.display_name(),
                target_duration - native,
                target_duration
            );
            FittedClip {
                source: clip.clone(),
                trim_start: 0.0,
                trim_end: native,
                target_duration: native,
                requested_duration: target_duration,
            }
        };
        Ok(fitted)
    }

    /// Fit clips to segments pairwise, in order.
    pub fn fit_all(
        &self,
        clips: &[SourceClip],
        segments: &[NarrationSegment],
    ) -> FitResult<FitReport> {
        let targets: Vec<f64> = segments.iter().map(NarrationSegment::duration).collect();
        self.fit_to_targets(clips, &targets)
    }

    /// Fit clips to explicit target lengths, pairwise.
    ///
    /// Used when targets are padded for outgoing transitions.
    pub fn fit_to_targets(&self, clips: &[SourceClip], targets: &[f64]) -> FitResult<FitReport> {
        if clips.len() != targets.len() {
            return Err(FitError::CountMismatch {
                clips: clips.len(),
                segments: targets.len(),
            });
        }

        let fitted = clips
            .iter()
            .zip(targets)
            .enumerate()
            .map(|(i, (clip, target))| self.fit(clip, *target).map_err(|e| e.at(i)))
            .collect::<FitResult<Vec<_>>>()?;

        let total_deficit = fitted.iter().map(FittedClip::deficit).sum();
        Ok(FitReport {
            clips: fitted,
            total_deficit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(native: f64) -> SourceClip {
        SourceClip::new("clip.mp4", native)
    }

    #[test]
    fn long_clip_is_trimmed_from_start() {
        let fitted = ClipFitter::default().fit(&clip(8.0), 5.0).unwrap();
        assert_eq!(fitted.trim_start, 0.0);
        assert_eq!(fitted.trim_end, 5.0);
        assert_eq!(fitted.target_duration, 5.0);
        assert!(!fitted.is_short());
    }

    #[test]
    fn center_anchor_keeps_the_middle() {
        let fitter = ClipFitter::new(2.5, TrimAnchor::Center);
        let fitted = fitter.fit(&clip(8.0), 4.0).unwrap();
        assert_eq!(fitted.trim_start, 2.0);
        assert_eq!(fitted.trim_end, 6.0);
    }

    #[test]
    fn short_clip_uses_full_length_and_reports_deficit() {
        let fitted = ClipFitter::default().fit(&clip(3.0), 5.0).unwrap();
        assert_eq!(fitted.trim_start, 0.0);
        assert_eq!(fitted.trim_end, 3.0);
        assert_eq!(fitted.target_duration, 3.0);
        assert_eq!(fitted.requested_duration, 5.0);
        assert_eq!(fitted.deficit(), 2.0);
    }

    #[test]
    fn trim_window_matches_target() {
        let fitter = ClipFitter::new(2.5, TrimAnchor::Center);
        for (native, target) in [(10.0, 3.3), (3.0, 7.0), (4.2, 4.2)] {
            let fitted = fitter.fit(&clip(native), target).unwrap();
            assert!((fitted.trim_end - fitted.trim_start - fitted.target_duration).abs() < 1e-9);
            assert!(fitted.trim_end <= native + 1e-9);
            assert!(fitted.target_duration >= 2.5);
        }
    }

    #[test]
    fn short_target_is_rejected() {
        let err = ClipFitter::default().fit(&clip(8.0), 2.0).unwrap_err();
        assert!(matches!(err, FitError::ClipTooShort { duration, .. } if duration == 2.0));
    }

    #[test]
    fn short_source_is_rejected() {
        let err = ClipFitter::default().fit(&clip(1.0), 5.0).unwrap_err();
        assert!(matches!(err, FitError::ClipTooShort { duration, .. } if duration == 1.0));
    }

    #[test]
    fn fit_all_reports_index_and_deficit() {
        let segments = vec![
            NarrationSegment::new(0, "a", 0.0, 4.0),
            NarrationSegment::new(1, "b", 4.0, 9.0),
        ];
        let report = ClipFitter::default()
            .fit_all(&[clip(6.0), clip(3.0)], &segments)
            .unwrap();
        assert_eq!(report.total_deficit, 2.0);

        let err = ClipFitter::default()
            .fit_all(&[clip(6.0), clip(1.0)], &segments)
            .unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert!(err.to_string().contains("Clip 1"));
    }

    #[test]
    fn fit_all_checks_counts() {
        let segments = vec![NarrationSegment::new(0, "a", 0.0, 4.0)];
        let err = ClipFitter::default().fit_all(&[], &segments).unwrap_err();
        assert!(matches!(err, FitError::CountMismatch { clips: 0, segments: 1 }));
    }

    #[test]
    fn padded_targets_are_honoured() {
        let report = ClipFitter::default()
            .fit_to_targets(&[clip(8.0), clip(8.0)], &[4.5, 4.0])
            .unwrap();
        assert_eq!(report.clips[0].trim_end, 4.5);
        assert_eq!(report.clips[1].target_duration, 4.0);
        assert_eq!(report.total_deficit, 0.0);
    }
}
