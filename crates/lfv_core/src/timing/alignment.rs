//! Word timings from character-level alignment.

use super::types::{CharacterAlignment, TimingError, TimingResult, WordTiming};

/// Group character timings into words, splitting on whitespace.
///
/// Each word starts at its first character's start time and ends at its
/// last character's end time.
pub fn words_from_characters(alignment: &CharacterAlignment) -> TimingResult<Vec<WordTiming>> {
    let n = alignment.characters.len();
    if n == 0 {
        return Err(TimingError::AlignmentUnavailable(
            "character alignment is empty".to_string(),
        ));
    }
    if alignment.character_start_times_seconds.len() != n
        || alignment.character_end_times_seconds.len() != n
    {
        return Err(TimingError::AlignmentUnavailable(format!(
            "alignment arrays differ in length: {} characters, {} starts, {} ends",
            n,
            alignment.character_start_times_seconds.len(),
            alignment.character_end_times_seconds.len()
        )));
    }

    let mut words = Vec::new();
    let mut text = String::new();
    let mut start = 0.0;
    let mut end = 0.0;

    for i in 0..n {
        let ch = &alignment.characters[i];
        if ch.trim().is_empty() {
            if !text.is_empty() {
                words.push(WordTiming::new(std::mem::take(&mut text), start, end));
            }
            continue;
        }
        if text.is_empty() {
            start = alignment.character_start_times_seconds[i];
        }
        text.push_str(ch);
        end = alignment.character_end_times_seconds[i];
    }
    if !text.is_empty() {
        words.push(WordTiming::new(text, start, end));
    }

    validate_words(&words)?;
    Ok(words)
}

/// Check that word timings are usable for segmentation.
///
/// Rejects empty input, non-finite or negative times, words ending before
/// they start, and words out of order.
pub fn validate_words(words: &[WordTiming]) -> TimingResult<()> {
    if words.is_empty() {
        return Err(TimingError::AlignmentUnavailable(
            "no words in alignment".to_string(),
        ));
    }

    let mut prev_start = 0.0;
    for (i, word) in words.iter().enumerate() {
        if !word.start.is_finite() || !word.end.is_finite() || word.start < 0.0 {
            return Err(TimingError::AlignmentUnavailable(format!(
                "word {} ('{}') has invalid times {}..{}",
                i, word.text, word.start, word.end
            )));
        }
        if word.end < word.start {
            return Err(TimingError::AlignmentUnavailable(format!(
                "word {} ('{}') ends before it starts",
                i, word.text
            )));
        }
        if word.start < prev_start {
            return Err(TimingError::AlignmentUnavailable(format!(
                "word {} ('{}') is out of order",
                i, word.text
            )));
        }
        prev_start = word.start;
    }
    Ok(())
}
