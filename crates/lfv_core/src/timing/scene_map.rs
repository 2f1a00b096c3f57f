//! Mapping narration words onto declared scenes.
//!
//! Each scene declares the narration it covers. Spoken words are matched to
//! the scene texts in order, token by token, so a scene spans from its first
//! spoken word to its last whatever number of sentences it holds. Any
//! disagreement between the alignment and the scene texts is reported as
//! `AlignmentUnavailable` so the fallback chain can take over.

use super::alignment::validate_words;
use super::segmenter::{clamp_overlaps, close_gaps};
use super::types::{NarrationSegment, TimingError, TimingResult, WordTiming};

/// Lowercased word tokens with punctuation removed.
///
/// Apostrophes inside words are kept ("don't"); hyphens and dashes split.
pub(crate) fn tokens(text: &str) -> Vec<String> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            c if c.is_alphanumeric() || c == '\'' => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn unavailable(message: String) -> TimingError {
    TimingError::AlignmentUnavailable(message)
}

/// Group `words` into one segment per entry of `scene_texts`.
///
/// With `close_gaps` the segments tile `[0, total_duration]`; otherwise
/// natural pauses between scenes are kept and only overlaps are removed.
pub fn map_words_to_scenes(
    words: &[WordTiming],
    scene_texts: &[String],
    total_duration: f64,
    close_gaps_between: bool,
) -> TimingResult<Vec<NarrationSegment>> {
    if scene_texts.is_empty() {
        return Err(TimingError::NoScenes);
    }
    validate_words(words)?;

    let expected: Vec<Vec<String>> = scene_texts.iter().map(|t| tokens(t)).collect();
    if let Some(i) = expected.iter().position(Vec::is_empty) {
        return Err(unavailable(format!("scene {} has no narration text", i)));
    }

    let mut spans: Vec<Option<(f64, f64)>> = vec![None; expected.len()];
    let mut scene = 0;
    let mut pos = 0;

    for word in words {
        // Punctuation-only entries carry no tokens and are skipped
        for token in tokens(&word.text) {
            if pos == expected[scene].len() {
                scene += 1;
                pos = 0;
                if scene == expected.len() {
                    return Err(unavailable(format!(
                        "narration continues past the last scene at {:.2}s ('{}')",
                        word.start, word.text
                    )));
                }
            }
            if expected[scene][pos] != token {
                return Err(unavailable(format!(
                    "word '{}' at {:.2}s does not match scene {} (expected '{}')",
                    word.text, word.start, scene, expected[scene][pos]
                )));
            }
            pos += 1;

            let span = spans[scene].get_or_insert((word.start, word.end));
            span.1 = span.1.max(word.end);
        }
    }

    if scene + 1 != expected.len() || pos != expected[scene].len() {
        return Err(unavailable(format!(
            "narration ends inside scene {} of {}",
            scene,
            expected.len()
        )));
    }

    let mut segments = Vec::with_capacity(expected.len());
    for (i, span) in spans.into_iter().enumerate() {
        let (start, end) =
            span.ok_or_else(|| unavailable(format!("scene {} is never spoken", i)))?;
        segments.push(NarrationSegment::new(i, scene_texts[i].trim(), start, end));
    }

    let mut segments = if close_gaps_between {
        close_gaps(segments)
    } else {
        clamp_overlaps(segments)
    };

    // Trailing silence after the last word belongs to the last scene
    if close_gaps_between && total_duration.is_finite() {
        if let Some(last) = segments.last_mut() {
            if total_duration > last.end {
                last.end = total_duration;
            }
        }
    }

    if let Some(bad) = segments.iter().find(|s| s.end <= s.start) {
        return Err(unavailable(format!(
            "scene {} has no duration ({:.3}..{:.3})",
            bad.index, bad.start, bad.end
        )));
    }

    tracing::debug!(
        "Mapped {} words onto {} scenes",
        words.len(),
        segments.len()
    );
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out `text` word by word, 0.5s per word, from `start`.
    fn spoken(text: &str, start: f64) -> Vec<WordTiming> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| {
                let s = start + i as f64 * 0.5;
                WordTiming::new(w, s, s + 0.45)
            })
            .collect()
    }

    fn scenes(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn tokens_ignore_case_and_punctuation() {
        assert_eq!(tokens("The harbor, wakes!"), vec!["the", "harbor", "wakes"]);
        assert_eq!(tokens("Don\u{2019}t stop"), vec!["don't", "stop"]);
        assert_eq!(tokens("well-known \"quote\""), vec!["well", "known", "quote"]);
        assert!(tokens(" -- ").is_empty());
    }

    #[test]
    fn several_sentences_belong_to_one_scene() {
        let mut words = spoken("The harbor wakes. Gulls call out.", 0.0);
        words.extend(spoken("Boats head out. Nets drop deep.", 3.5));
        let texts = scenes(&["The harbor wakes. Gulls call out.", "Boats head out. Nets drop deep."]);

        let segments = map_words_to_scenes(&words, &texts, 8.0, true).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 3.5);
        assert_eq!(segments[1].start, 3.5);
        assert_eq!(segments[1].end, 8.0);
        assert_eq!(segments[1].text, "Boats head out. Nets drop deep.");
    }

    #[test]
    fn scene_boundary_inside_a_sentence() {
        let words = spoken("Boats head out, and nets drop deep.", 0.0);
        let texts = scenes(&["Boats head out,", "and nets drop deep."]);

        let segments = map_words_to_scenes(&words, &texts, 4.0, true).unwrap();
        assert_eq!(segments[0].end, 1.5);
        assert_eq!(segments[1].start, 1.5);
    }

    #[test]
    fn open_gaps_keep_pauses() {
        let mut words = spoken("One.", 0.0);
        words.extend(spoken("Two.", 2.0));
        let segments =
            map_words_to_scenes(&words, &scenes(&["One.", "Two."]), 5.0, false).unwrap();
        assert_eq!(segments[0].end, 0.45);
        assert_eq!(segments[1].start, 2.0);
        assert!((segments[1].end - 2.45).abs() < 1e-9);
    }

    #[test]
    fn mismatched_text_is_unavailable() {
        let words = spoken("The harbor sleeps.", 0.0);
        let err = map_words_to_scenes(&words, &scenes(&["The harbor wakes."]), 2.0, true)
            .unwrap_err();
        assert!(matches!(err, TimingError::AlignmentUnavailable(m) if m.contains("sleeps")));
    }

    #[test]
    fn extra_or_missing_narration_is_unavailable() {
        let words = spoken("One. Two.", 0.0);
        assert!(map_words_to_scenes(&words, &scenes(&["One."]), 2.0, true).is_err());
        assert!(map_words_to_scenes(&words, &scenes(&["One.", "Two.", "Three."]), 2.0, true)
            .is_err());
    }

    #[test]
    fn scene_without_text_is_unavailable() {
        let words = spoken("One.", 0.0);
        let err = map_words_to_scenes(&words, &scenes(&["One.", "  "]), 2.0, true).unwrap_err();
        assert!(matches!(err, TimingError::AlignmentUnavailable(_)));
    }
}
