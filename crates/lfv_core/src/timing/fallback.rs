//! Segmentation strategies and the fallback chain.
//!
//! Strategies are tried in order. The first one that produces segments
//! wins; failures are recorded so the run manifest can show why the
//! preferred strategy was not used.

use serde::{Deserialize, Serialize};

use super::scene_map::map_words_to_scenes;
use super::segmenter::segment_words;
use super::types::{
    NarrationInput, NarrationSegment, SegmenterConfig, TimingError, TimingResult,
};

/// A way of turning narration into segments.
pub trait SegmentationStrategy: Send + Sync {
    /// Strategy name (for logs and the manifest).
    fn name(&self) -> &'static str;

    /// Produce segments, or fail so the next strategy is tried.
    fn segment(&self, input: &NarrationInput) -> TimingResult<Vec<NarrationSegment>>;
}

/// Segments from word-level alignment.
///
/// When the scenes declare their narration text, words are mapped onto the
/// scenes, one segment per scene. Without scene text the words are grouped
/// into sentences, which must then come out one per scene.
pub struct AlignedSegmentation {
    config: SegmenterConfig,
}

impl AlignedSegmentation {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }
}

impl SegmentationStrategy for AlignedSegmentation {
    fn name(&self) -> &'static str {
        "aligned"
    }

    fn segment(&self, input: &NarrationInput) -> TimingResult<Vec<NarrationSegment>> {
        let words = input.words.as_deref().ok_or_else(|| {
            TimingError::AlignmentUnavailable("speech service returned no alignment".to_string())
        })?;
        if input.scene_texts.iter().any(|t| !t.trim().is_empty()) {
            return map_words_to_scenes(
                words,
                &input.scene_texts,
                input.total_duration,
                self.config.close_gaps,
            );
        }

        let mut segments = segment_words(words, &self.config)?;

        // The audio may carry trailing silence after the last word
        if self.config.close_gaps && input.total_duration.is_finite() {
            if let Some(last) = segments.last_mut() {
                if input.total_duration > last.end {
                    last.end = input.total_duration;
                }
            }
        }

        if !input.scene_texts.is_empty() && segments.len() != input.scene_texts.len() {
            return Err(TimingError::AlignmentUnavailable(format!(
                "{} sentences for {} scenes and no scene text to group them by",
                segments.len(),
                input.scene_texts.len()
            )));
        }
        Ok(segments)
    }
}

/// Equal shares of the narration, one per declared scene.
pub struct UniformSegmentation;

impl SegmentationStrategy for UniformSegmentation {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn segment(&self, input: &NarrationInput) -> TimingResult<Vec<NarrationSegment>> {
        uniform_segments(
            input.total_duration,
            input.scene_texts.len(),
            &input.scene_texts,
        )
    }
}

/// Split `total_duration` into `scene_count` equal segments.
///
/// Texts are taken from `texts` by position; missing entries are empty.
pub fn uniform_segments(
    total_duration: f64,
    scene_count: usize,
    texts: &[String],
) -> TimingResult<Vec<NarrationSegment>> {
    if scene_count == 0 {
        return Err(TimingError::NoScenes);
    }
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(TimingError::InvalidDuration(total_duration));
    }

    let share = total_duration / scene_count as f64;
    let segments = (0..scene_count)
        .map(|i| {
            let start = share * i as f64;
            let end = if i + 1 == scene_count {
                total_duration
            } else {
                share * (i + 1) as f64
            };
            let text = texts.get(i).cloned().unwrap_or_default();
            NarrationSegment::new(i, text, start, end)
        })
        .collect();
    Ok(segments)
}

/// A strategy that failed, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub strategy: String,
    pub reason: String,
}

/// Result of running the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationOutcome {
    pub segments: Vec<NarrationSegment>,
    /// Name of the strategy that produced `segments`.
    pub strategy: String,
    /// Strategies tried before it.
    pub attempts: Vec<FailedAttempt>,
}

impl SegmentationOutcome {
    /// Whether a strategy other than the first one was used.
    pub fn used_fallback(&self) -> bool {
        !self.attempts.is_empty()
    }
}

/// The standard chain: alignment first, uniform split second.
pub fn default_chain(config: SegmenterConfig) -> Vec<Box<dyn SegmentationStrategy>> {
    vec![
        Box::new(AlignedSegmentation::new(config)),
        Box::new(UniformSegmentation),
    ]
}

/// Try each strategy in order until one succeeds.
///
/// Returns the last strategy's error if every strategy fails.
pub fn segment_with_fallback(
    strategies: &[Box<dyn SegmentationStrategy>],
    input: &NarrationInput,
) -> TimingResult<SegmentationOutcome> {
    let mut attempts = Vec::new();
    let mut last_error = TimingError::AlignmentUnavailable("no strategies configured".to_string());

    for strategy in strategies {
        match strategy.segment(input) {
            Ok(segments) => {
                tracing::info!(
                    "Segmentation by '{}' produced {} segments",
                    strategy.name(),
                    segments.len()
                );
                return Ok(SegmentationOutcome {
                    segments,
                    strategy: strategy.name().to_string(),
                    attempts,
                });
            }
            Err(e) => {
                tracing::warn!("Segmentation strategy '{}' failed: {}", strategy.name(), e);
                attempts.push(FailedAttempt {
                    strategy: strategy.name().to_string(),
                    reason: e.to_string(),
                });
                last_error = e;
            }
        }
    }

    Err(last_error)
}
