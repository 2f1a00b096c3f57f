//! Merging segments that are too short to carry their own clip.

use crate::timing::NarrationSegment;

use super::types::{FitError, FitResult};

/// Merge segments shorter than `min_duration` into a neighbour.
///
/// A short segment absorbs the one after it; the last segment is absorbed
/// by the one before it. Repeats until every segment reaches the minimum.
/// Indices are renumbered. A single segment below the minimum has nothing
/// to merge with and fails with `ClipTooShort`.
pub fn merge_short_segments(
    segments: &[NarrationSegment],
    min_duration: f64,
) -> FitResult<Vec<NarrationSegment>> {
    let mut out: Vec<NarrationSegment> = segments.to_vec();

    while let Some(pos) = out.iter().position(|s| s.duration() < min_duration) {
        if out.len() == 1 {
            return Err(FitError::ClipTooShort {
                index: Some(out[0].index),
                duration: out[0].duration(),
                minimum: min_duration,
            });
        }

        if pos + 1 < out.len() {
            let short = out.remove(pos);
            let next = &mut out[pos];
            next.text = join_text(&short.text, &next.text);
            next.start = short.start;
        } else {
            let short = out.remove(pos);
            let prev = &mut out[pos - 1];
            prev.text = join_text(&prev.text, &short.text);
            prev.end = short.end;
        }
    }

    for (i, seg) in out.iter_mut().enumerate() {
        seg.index = i;
    }
    Ok(out)
}

fn join_text(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(bounds: &[f64]) -> Vec<NarrationSegment> {
        bounds
            .windows(2)
            .enumerate()
            .map(|(i, w)| NarrationSegment::new(i, format!("s{}", i), w[0], w[1]))
            .collect()
    }

    #[test]
    fn short_segment_merges_with_next() {
        let merged = merge_short_segments(&segs(&[0.0, 4.0, 5.0, 9.0]), 2.5).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].start, 4.0);
        assert_eq!(merged[1].end, 9.0);
        assert_eq!(merged[1].text, "s1 s2");
        assert_eq!(merged[1].index, 1);
    }

    #[test]
    fn short_last_segment_merges_with_previous() {
        let merged = merge_short_segments(&segs(&[0.0, 4.0, 5.0]), 2.5).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].end, 5.0);
        assert_eq!(merged[0].text, "s0 s1");
    }

    #[test]
    fn chains_of_short_segments_collapse() {
        let merged = merge_short_segments(&segs(&[0.0, 1.0, 2.0, 3.0, 7.0]), 2.5).unwrap();
        assert!(merged.iter().all(|s| s.duration() >= 2.5));
        assert_eq!(merged.first().map(|s| s.start), Some(0.0));
        assert_eq!(merged.last().map(|s| s.end), Some(7.0));
    }

    #[test]
    fn lone_short_segment_fails() {
        let err = merge_short_segments(&segs(&[0.0, 2.0]), 2.5).unwrap_err();
        assert!(matches!(err, FitError::ClipTooShort { index: Some(0), .. }));
    }

    #[test]
    fn long_segments_are_untouched() {
        let input = segs(&[0.0, 3.0, 6.0]);
        assert_eq!(merge_short_segments(&input, 2.5).unwrap(), input);
    }
}
