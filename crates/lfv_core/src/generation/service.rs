//! Generation services.
//!
//! [`GenerationService`] is the seam between the dispatcher and whatever
//! produces media. [`HttpGenerationService`] talks to a queue-style HTTP
//! gateway: submit, poll the status URL, fetch the result, download the
//! media it points at.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationSettings;
use crate::timing::CharacterAlignment;

use super::types::{GeneratedMedia, GenerationError, GenerationRequest, GenerationResult};

/// Something that turns a request into media on disk.
#[async_trait]
pub trait GenerationService: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the media for `request`.
    ///
    /// Implementations should stop early when `cancel` fires.
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationResult<GeneratedMedia>;
}

/// Interval between status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Words in a 400/422 body that mark a content policy refusal.
const POLICY_MARKERS: [&str; 4] = ["content policy", "policy", "flagged", "safety"];

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

/// HTTP gateway client.
pub struct HttpGenerationService {
    client: Client,
    base_url: String,
    api_key: String,
    output_dir: PathBuf,
}

impl HttpGenerationService {
    /// The API key is passed in; this type never reads the environment.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_settings(
        settings: &GenerationSettings,
        api_key: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(settings.base_url.clone(), api_key, output_dir)
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn submit(&self, request: &GenerationRequest) -> GenerationResult<QueueSubmission> {
        let url = format!("{}/{}", self.base_url, request.model);
        tracing::debug!("Submitting request {} to {}", request.index, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&request.payload())
            .send()
            .await?;

        let response = check_status(request, response).await?;
        Ok(response.json::<QueueSubmission>().await?)
    }

    async fn wait_for_completion(
        &self,
        request: &GenerationRequest,
        submission: &QueueSubmission,
        cancel: &CancellationToken,
    ) -> GenerationResult<()> {
        loop {
            let response = self
                .client
                .get(&submission.status_url)
                .header("Authorization", self.auth_header())
                .send()
                .await?;
            let status: QueueStatus = check_status(request, response).await?.json().await?;

            match status.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {}
                other => {
                    return Err(GenerationError::InvalidResponse(format!(
                        "request {} has unexpected status {}",
                        submission.request_id, other
                    )))
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    async fn download(&self, url: &str, path: &Path) -> GenerationResult<()> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GenerationError::Api {
                status: response.status().as_u16(),
                message: format!("download failed: {}", url),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> GenerationResult<GeneratedMedia> {
        let submission = self.submit(request).await?;
        self.wait_for_completion(request, &submission, cancel).await?;

        let response = self
            .client
            .get(&submission.response_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let result: Value = check_status(request, response).await?.json().await?;

        let url = extract_media_url(&result).ok_or_else(|| {
            GenerationError::InvalidResponse(format!(
                "no media URL in result for request {}",
                request.index
            ))
        })?;
        let path = self.output_dir.join(request.output_file_name());
        self.download(&url, &path).await?;

        tracing::info!("Generated {} {} -> {}", request.kind, request.index, path.display());

        Ok(GeneratedMedia {
            index: request.index,
            kind: request.kind,
            path,
            url,
            alignment: extract_alignment(&result),
        })
    }
}

async fn check_status(
    request: &GenerationRequest,
    response: reqwest::Response,
) -> GenerationResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(request, status, retry_after, &body))
}

/// Map a failed HTTP status to a generation error.
pub fn classify_status(
    request: &GenerationRequest,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> GenerationError {
    match status.as_u16() {
        429 | 503 => GenerationError::RateLimited { retry_after },
        408 | 504 => GenerationError::Timeout,
        400 | 422 if is_policy_rejection(body) => GenerationError::ContentPolicyRejection {
            index: request.index,
            prompt: request.prompt.clone(),
            message: body.trim().to_string(),
        },
        code => GenerationError::Api {
            status: code,
            message: body.trim().to_string(),
        },
    }
}

fn is_policy_rejection(body: &str) -> bool {
    let lower = body.to_lowercase();
    POLICY_MARKERS.iter().any(|m| lower.contains(m))
}

/// `Retry-After` in seconds. HTTP dates are not supported.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Find the media URL in a result body.
///
/// Checks the shapes the gateway's video, image and audio models return.
pub fn extract_media_url(result: &Value) -> Option<String> {
    const SINGLE: [&str; 4] = ["video", "audio", "audio_file", "image"];

    for key in SINGLE {
        if let Some(url) = result.get(key).and_then(|v| v.get("url")).and_then(Value::as_str) {
            return Some(url.to_string());
        }
    }
    result
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(|img| img.get("url"))
        .and_then(Value::as_str)
        .or_else(|| result.get("url").and_then(Value::as_str))
        .map(str::to_string)
}

/// Character timings from a speech result, if present.
pub fn extract_alignment(result: &Value) -> Option<CharacterAlignment> {
    ["normalized_alignment", "alignment"]
        .iter()
        .filter_map(|key| result.get(*key))
        .find_map(|v| serde_json::from_value::<CharacterAlignment>(v.clone()).ok())
        .filter(|a| !a.characters.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationKind;
    use serde_json::json;

    fn request() -> GenerationRequest {
        GenerationRequest::new(4, GenerationKind::Video, "a stormy sea")
    }

    #[test]
    fn rate_limit_statuses_are_retryable() {
        let err = classify_status(
            &request(),
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            "",
        );
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(classify_status(&request(), StatusCode::GATEWAY_TIMEOUT, None, "").is_retryable());
    }

    #[test]
    fn policy_wording_becomes_rejection() {
        let err = classify_status(
            &request(),
            StatusCode::UNPROCESSABLE_ENTITY,
            None,
            "{\"detail\": \"Prompt was flagged by content policy\"}",
        );
        match err {
            GenerationError::ContentPolicyRejection { index, prompt, .. } => {
                assert_eq!(index, 4);
                assert_eq!(prompt, "a stormy sea");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_client_errors_are_api_errors() {
        let err = classify_status(&request(), StatusCode::BAD_REQUEST, None, "missing field");
        assert!(matches!(err, GenerationError::Api { status: 400, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_header_parses_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn media_url_shapes() {
        assert_eq!(
            extract_media_url(&json!({"video": {"url": "https://x/v.mp4"}})).as_deref(),
            Some("https://x/v.mp4")
        );
        assert_eq!(
            extract_media_url(&json!({"images": [{"url": "https://x/i.png"}]})).as_deref(),
            Some("https://x/i.png")
        );
        assert_eq!(
            extract_media_url(&json!({"audio": {"url": "https://x/a.mp3"}})).as_deref(),
            Some("https://x/a.mp3")
        );
        assert_eq!(extract_media_url(&json!({"seed": 3})), None);
    }

    #[test]
    fn alignment_is_extracted_when_present() {
        let result = json!({
            "audio": {"url": "https://x/a.mp3"},
            "normalized_alignment": {
                "characters": ["H", "i"],
                "character_start_times_seconds": [0.0, 0.1],
                "character_end_times_seconds": [0.1, 0.2]
            }
        });
        let alignment = extract_alignment(&result).unwrap();
        assert_eq!(alignment.characters, vec!["H", "i"]);
        assert!(extract_alignment(&json!({"audio": {}})).is_none());
    }
}
