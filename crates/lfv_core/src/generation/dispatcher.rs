//! Bounded, retrying dispatch of generation requests.
//!
//! At most `max_concurrent` requests run at once. Rate limits and timeouts
//! are retried with exponential backoff up to `max_attempts`; every other
//! error is returned as-is. Each request gets a child of the dispatcher's
//! cancellation token, so one request can be cancelled without touching
//! its siblings while cancelling the dispatcher stops them all.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationSettings;

use super::service::GenerationService;
use super::types::{GeneratedMedia, GenerationError, GenerationRequest, GenerationResult};

/// Dispatch limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchConfig {
    pub max_concurrent: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from_settings(&GenerationSettings::default())
    }
}

impl DispatchConfig {
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.max(1),
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(settings.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(settings.max_delay_secs.max(0.0)),
            request_timeout: Duration::from_secs_f64(settings.request_timeout_secs.max(0.001)),
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt` (1-based) failed.
    ///
    /// `base * 2^(attempt-1)` capped at `max_delay`. A service-provided
    /// `retry_after` wins when it is longer.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let exponential = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match retry_after {
            Some(requested) => requested.max(exponential),
            None => exponential,
        }
    }
}

/// A request in flight.
pub struct RequestHandle {
    pub index: usize,
    token: CancellationToken,
    task: JoinHandle<GenerationResult<GeneratedMedia>>,
}

impl RequestHandle {
    /// Cancel this request only.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the outcome.
    pub async fn wait(self) -> GenerationResult<GeneratedMedia> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(GenerationError::Cancelled),
            Err(e) => Err(GenerationError::InvalidResponse(format!(
                "generation task {} panicked: {}",
                self.index, e
            ))),
        }
    }
}

/// Runs requests against a service with bounded concurrency.
pub struct Dispatcher {
    service: Arc<dyn GenerationService>,
    config: DispatchConfig,
    permits: Arc<Semaphore>,
    root: CancellationToken,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn GenerationService>, config: DispatchConfig) -> Self {
        Self {
            service,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            root: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Cancel every request, queued or running.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Start one request. It waits for a permit before calling the service.
    pub fn submit(&self, request: GenerationRequest) -> RequestHandle {
        let token = self.root.child_token();
        let index = request.index;
        let service = Arc::clone(&self.service);
        let permits = Arc::clone(&self.permits);
        let config = self.config;
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = task_token.cancelled() => return Err(GenerationError::Cancelled),
                permit = permits.acquire_owned() => permit.map_err(|_| GenerationError::Cancelled)?,
            };
            run_with_retry(service.as_ref(), &request, &config, &task_token).await
        });

        RequestHandle { index, token, task }
    }

    /// Run a batch and return results in request order.
    pub async fn dispatch_all(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<GenerationResult<GeneratedMedia>> {
        let handles: Vec<RequestHandle> = requests.into_iter().map(|r| self.submit(r)).collect();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.wait().await);
        }
        results
    }
}

async fn run_with_retry(
    service: &dyn GenerationService,
    request: &GenerationRequest,
    config: &DispatchConfig,
    cancel: &CancellationToken,
) -> GenerationResult<GeneratedMedia> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = tokio::time::timeout(config.request_timeout, service.generate(request, cancel)) => {
                result.unwrap_or(Err(GenerationError::Timeout))
            }
        };

        let error = match outcome {
            Ok(media) => {
                if attempt > 1 {
                    tracing::info!("Request {} succeeded on attempt {}", request.index, attempt);
                }
                return Ok(media);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::warn!("Request {} failed: {}", request.index, error);
            return Err(error);
        }
        if attempt >= config.max_attempts {
            return Err(GenerationError::RetriesExhausted {
                index: request.index,
                attempts: attempt,
                last: Box::new(error),
            });
        }

        let delay = config.backoff(attempt, error.retry_after());
        tracing::warn!(
            "Request {} attempt {}/{} failed ({}); retrying in {:.1}s",
            request.index,
            attempt,
            config.max_attempts,
            error,
            delay.as_secs_f64()
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
