//! Asset generation.
//!
//! Clips, images, narration, music and sound effects come from external
//! generation services. Requests are dispatched with bounded concurrency,
//! retried with backoff on rate limits and timeouts, and returned in the
//! order they were submitted.

mod dispatcher;
mod service;
mod types;

pub use dispatcher::{DispatchConfig, Dispatcher, RequestHandle};
pub use service::{
    classify_status, extract_alignment, extract_media_url, GenerationService,
    HttpGenerationService,
};
pub use types::{
    GeneratedMedia, GenerationError, GenerationKind, GenerationRequest, GenerationResult,
};
