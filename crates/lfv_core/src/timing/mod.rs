//! Narration timing model.
//!
//! Turns the voiceover's word timings into [`NarrationSegment`]s, the
//! single source of truth for how long each clip must be. When scenes
//! declare their narration text, words are mapped onto those scenes;
//! otherwise they are grouped into sentences. When word timings are
//! missing or disagree with the scenes, an ordered fallback chain divides
//! the narration evenly across the declared scenes.

mod alignment;
mod fallback;
mod scene_map;
mod segmenter;
mod types;

pub use alignment::{validate_words, words_from_characters};
pub use fallback::{
    default_chain, segment_with_fallback, uniform_segments, AlignedSegmentation, FailedAttempt,
    SegmentationOutcome, SegmentationStrategy, UniformSegmentation,
};
pub use scene_map::map_words_to_scenes;
pub use segmenter::segment_words;
pub use types::{
    CharacterAlignment, NarrationInput, NarrationSegment, SegmenterConfig, TimingError,
    TimingResult, WordTiming,
};
