//! Grouping word timings into narration segments.
//!
//! Words are grouped into sentence-like spans. A span ends after
//! sentence-terminal punctuation, after clause punctuation when enabled,
//! or when the silence before the next word exceeds the pause threshold.
//! Spans with too little speech are folded into a neighbour, and with
//! `close_gaps` the result tiles `[0, narration end]` exactly.

use super::alignment::validate_words;
use super::types::{NarrationSegment, SegmenterConfig, TimingError, TimingResult, WordTiming};

/// Characters that may trail punctuation without hiding it (quotes, brackets).
const TRAILING_CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201D}', '\u{2019}'];

/// Partition word timings into ordered, non-overlapping segments.
pub fn segment_words(
    words: &[WordTiming],
    config: &SegmenterConfig,
) -> TimingResult<Vec<NarrationSegment>> {
    validate_words(words)?;

    let raw = group_words(words, config);
    let merged = merge_fragments(raw, config.min_fragment);
    let mut segments = if config.close_gaps {
        close_gaps(merged)
    } else {
        clamp_overlaps(merged)
    };

    for (i, seg) in segments.iter_mut().enumerate() {
        seg.index = i;
    }

    if let Some(bad) = segments.iter().find(|s| s.end <= s.start) {
        return Err(TimingError::AlignmentUnavailable(format!(
            "segment {} has no duration ({:.3}..{:.3})",
            bad.index, bad.start, bad.end
        )));
    }

    tracing::debug!(
        "Segmented {} words into {} segments",
        words.len(),
        segments.len()
    );
    Ok(segments)
}

fn group_words(words: &[WordTiming], config: &SegmenterConfig) -> Vec<NarrationSegment> {
    let mut segments = Vec::new();
    let mut current: Vec<&WordTiming> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        current.push(word);

        let pause_follows = words
            .get(i + 1)
            .map(|next| next.start - word.end > config.pause_threshold)
            .unwrap_or(false);

        let breaks = ends_sentence(&word.text)
            || (config.clause_breaks && ends_clause(&word.text))
            || pause_follows;

        if breaks {
            segments.push(span(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        segments.push(span(&current));
    }
    segments
}

fn span(words: &[&WordTiming]) -> NarrationSegment {
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let start = words.first().map(|w| w.start).unwrap_or(0.0);
    let end = words.iter().map(|w| w.end).fold(start, f64::max);
    NarrationSegment::new(0, text, start, end)
}

fn last_significant_char(text: &str) -> Option<char> {
    text.trim_end_matches(TRAILING_CLOSERS).chars().last()
}

fn ends_sentence(text: &str) -> bool {
    matches!(last_significant_char(text), Some('.' | '!' | '?' | '\u{2026}'))
}

fn ends_clause(text: &str) -> bool {
    matches!(last_significant_char(text), Some(',' | ';' | ':'))
}

/// Fold spans shorter than `min_fragment` into the previous span.
///
/// A short leading span has no predecessor and folds forward instead.
fn merge_fragments(raw: Vec<NarrationSegment>, min_fragment: f64) -> Vec<NarrationSegment> {
    let mut out: Vec<NarrationSegment> = Vec::with_capacity(raw.len());

    for seg in raw {
        match out.last_mut() {
            Some(prev) if seg.duration() < min_fragment => {
                prev.text = format!("{} {}", prev.text, seg.text);
                prev.end = prev.end.max(seg.end);
            }
            _ => out.push(seg),
        }
    }

    if out.len() > 1 && out[0].duration() < min_fragment {
        let first = out.remove(0);
        out[0].text = format!("{} {}", first.text, out[0].text);
        out[0].start = first.start;
    }
    out
}

/// Stretch segments so they tile the narration from zero with no gaps.
pub(super) fn close_gaps(mut segments: Vec<NarrationSegment>) -> Vec<NarrationSegment> {
    if let Some(first) = segments.first_mut() {
        first.start = 0.0;
    }
    for i in 0..segments.len().saturating_sub(1) {
        segments[i].end = segments[i + 1].start;
    }
    segments
}

/// Keep natural gaps but remove overlap from overlapping word timings.
pub(super) fn clamp_overlaps(mut segments: Vec<NarrationSegment>) -> Vec<NarrationSegment> {
    for i in 0..segments.len().saturating_sub(1) {
        let next_start = segments[i + 1].start;
        if segments[i].end > next_start {
            segments[i].end = next_start;
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out a sentence's words evenly over `[start, end)`.
    fn sentence(text: &str, start: f64, end: f64) -> Vec<WordTiming> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        let step = (end - start) / parts.len() as f64;
        parts
            .iter()
            .enumerate()
            .map(|(i, p)| {
                WordTiming::new(*p, start + i as f64 * step, start + (i + 1) as f64 * step - 0.05)
            })
            .collect()
    }

    #[test]
    fn three_sentences_make_three_segments() {
        let mut words = sentence("The sun rose over the hills.", 0.0, 4.0);
        words.extend(sentence("Birds began to sing loudly.", 4.0, 8.0));
        words.extend(sentence("A new day had started.", 8.0, 12.0));

        let segments = segment_words(&words, &SegmenterConfig::default()).unwrap();

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "The sun rose over the hills.");
        assert_eq!(segments[2].index, 2);
        // Tiled: no gaps, no overlaps, starts at zero
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, segments[1].start);
        assert_eq!(segments[1].end, segments[2].start);
        assert!((segments[2].end - 11.95).abs() < 1e-9);
    }

    #[test]
    fn long_pause_splits_without_punctuation() {
        let mut words = sentence("and then nothing happened for", 0.0, 3.0);
        words.extend(sentence("a very long time after that", 4.0, 7.0));

        let segments = segment_words(&words, &SegmenterConfig::default()).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[1].text.starts_with("a very"));
    }

    #[test]
    fn short_fragment_merges_into_previous() {
        let mut words = sentence("This is the first full sentence.", 0.0, 4.0);
        words.extend(sentence("Wow.", 4.0, 4.5));
        words.extend(sentence("And here is another sentence.", 4.6, 8.0));

        let segments = segment_words(&words, &SegmenterConfig::default()).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].text.ends_with("Wow."));
    }

    #[test]
    fn short_leading_fragment_merges_forward() {
        let mut words = sentence("Look.", 0.0, 0.4);
        words.extend(sentence("The storm is coming over the sea.", 0.5, 4.0));

        let segments = segment_words(&words, &SegmenterConfig::default()).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].text.starts_with("Look."));
        assert_eq!(segments[0].start, 0.0);
    }

    #[test]
    fn clause_breaks_are_optional() {
        let words = sentence("First part here, second part there.", 0.0, 6.0);

        let plain = segment_words(&words, &SegmenterConfig::default()).unwrap();
        assert_eq!(plain.len(), 1);

        let config = SegmenterConfig {
            clause_breaks: true,
            ..SegmenterConfig::default()
        };
        let split = segment_words(&words, &config).unwrap();
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn quoted_terminal_punctuation_counts() {
        assert!(ends_sentence("said \"stop.\""));
        assert!(ends_sentence("really?)"));
        assert!(!ends_sentence("word"));
    }

    #[test]
    fn keeps_gaps_when_not_closing() {
        let mut words = sentence("One full sentence here.", 0.5, 3.0);
        words.extend(sentence("Another full sentence.", 3.5, 6.0));
        let config = SegmenterConfig {
            close_gaps: false,
            ..SegmenterConfig::default()
        };

        let segments = segment_words(&words, &config).unwrap();
        assert_eq!(segments[0].start, 0.5);
        assert!(segments[0].end <= segments[1].start);
    }

    #[test]
    fn empty_alignment_is_unavailable() {
        let err = segment_words(&[], &SegmenterConfig::default()).unwrap_err();
        assert!(matches!(err, TimingError::AlignmentUnavailable(_)));
    }
}
