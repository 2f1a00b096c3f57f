//! Types for generation requests.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::timing::CharacterAlignment;

/// What a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Video,
    Image,
    Speech,
    Music,
    Sfx,
}

impl GenerationKind {
    /// Model used when the request names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            GenerationKind::Video => "fal-ai/veo3.1/fast",
            GenerationKind::Image => "fal-ai/nano-banana-pro",
            GenerationKind::Speech => "fal-ai/elevenlabs/tts/turbo-v2.5",
            GenerationKind::Music => "fal-ai/elevenlabs/music",
            GenerationKind::Sfx => "fal-ai/elevenlabs/sound-effects",
        }
    }

    /// Extension for downloaded files.
    pub fn extension(&self) -> &'static str {
        match self {
            GenerationKind::Video => "mp4",
            GenerationKind::Image => "png",
            GenerationKind::Speech | GenerationKind::Music | GenerationKind::Sfx => "mp3",
        }
    }

    /// Payload key the prompt is sent under.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            GenerationKind::Speech => "text",
            _ => "prompt",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationKind::Video => write!(f, "video"),
            GenerationKind::Image => write!(f, "image"),
            GenerationKind::Speech => write!(f, "speech"),
            GenerationKind::Music => write!(f, "music"),
            GenerationKind::Sfx => write!(f, "sfx"),
        }
    }
}

/// One asset to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Position in the batch (scene index for clips).
    pub index: usize,
    pub kind: GenerationKind,
    pub model: String,
    pub prompt: String,
    /// Extra model arguments, sent as-is.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(index: usize, kind: GenerationKind, prompt: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            model: kind.default_model().to_string(),
            prompt: prompt.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// JSON body for the service.
    pub fn payload(&self) -> Value {
        let mut body = self.arguments.clone();
        body.insert(
            self.kind.prompt_key().to_string(),
            Value::String(self.prompt.clone()),
        );
        Value::Object(body)
    }

    /// File name for the downloaded result.
    pub fn output_file_name(&self) -> String {
        format!("{}_{:03}.{}", self.kind, self.index, self.kind.extension())
    }
}

/// A generated asset on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMedia {
    pub index: usize,
    pub kind: GenerationKind,
    pub path: PathBuf,
    /// Where the service published it.
    pub url: String,
    /// Character timings, for speech that carries them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<CharacterAlignment>,
}

/// Errors from generation services and the dispatcher.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The provider refused the prompt. Not retried.
    #[error("Content policy rejected request {index}: {message} (prompt: {prompt:?})")]
    ContentPolicyRejection {
        index: usize,
        prompt: String,
        message: String,
    },

    /// Too many requests; retry after a delay.
    #[error("Rate limited{}", describe_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    /// A retryable error persisted through every attempt.
    #[error("Request {index} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        index: usize,
        attempts: u32,
        last: Box<GenerationError>,
    },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {:.1}s)", d.as_secs_f64()),
        None => String::new(),
    }
}

impl GenerationError {
    /// Whether the dispatcher should back off and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. } | GenerationError::Timeout
        )
    }

    /// Delay requested by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GenerationError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Type alias for generation results.
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_merges_prompt_and_arguments() {
        let request = GenerationRequest::new(3, GenerationKind::Video, "a lighthouse at dusk")
            .with_argument("duration", "8s")
            .with_argument("aspect_ratio", "16:9");
        assert_eq!(
            request.payload(),
            json!({"prompt": "a lighthouse at dusk", "duration": "8s", "aspect_ratio": "16:9"})
        );
        assert_eq!(request.output_file_name(), "video_003.mp4");
    }

    #[test]
    fn model_defaults_by_kind_and_can_be_overridden() {
        let request = GenerationRequest::new(1, GenerationKind::Image, "a quiet harbour");
        assert_eq!(request.model, GenerationKind::Image.default_model());

        let request = request.with_model("fal-ai/flux/dev");
        assert_eq!(request.model, "fal-ai/flux/dev");
    }

    #[test]
    fn speech_sends_text() {
        let request = GenerationRequest::new(0, GenerationKind::Speech, "Hello there.")
            .with_argument("voice", "Aria");
        assert_eq!(request.payload()["text"], "Hello there.");
        assert!(request.payload().get("prompt").is_none());
    }

    #[test]
    fn only_rate_limits_and_timeouts_retry() {
        assert!(GenerationError::Timeout.is_retryable());
        assert!(GenerationError::RateLimited { retry_after: None }.is_retryable());
        assert!(!GenerationError::Cancelled.is_retryable());
        assert!(!GenerationError::ContentPolicyRejection {
            index: 0,
            prompt: "p".to_string(),
            message: "flagged".to_string(),
        }
        .is_retryable());
    }
}
