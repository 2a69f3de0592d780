//! HTTP client for the remote layout-aware OCR service.
//!
//! All page images of a document go out as a single multipart request.
//! Input limits are enforced client-side so an oversized batch never
//! reaches the wire; transient failures retry with full-jitter backoff.

use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::core::config::OcrConfig;
use crate::utils::{Backoff, BackoffPolicy};
use crate::{LingoError, Result};

use super::wire::OcrLayout;

/// Counters kept across the client's lifetime.
#[derive(Debug, Default)]
struct MetricsInner {
    requests: u64,
    successes: u64,
    retries: u64,
    auth_failures: u64,
    rate_limited: u64,
    timeouts: u64,
    service_failures: u64,
    protocol_failures: u64,
    invalid_input: u64,
    total_latency: Duration,
    completed_calls: u64,
}

/// Point-in-time view of the client's metrics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OcrMetrics {
    pub requests: u64,
    pub successes: u64,
    pub retries: u64,
    pub auth_failures: u64,
    pub rate_limited: u64,
    pub timeouts: u64,
    pub service_failures: u64,
    pub protocol_failures: u64,
    pub invalid_input: u64,
    pub mean_latency_ms: f64,
}

/// Client for the OCR endpoint.
pub struct OcrClient {
    http: reqwest::Client,
    config: OcrConfig,
    semaphore: Semaphore,
    metrics: Mutex<MetricsInner>,
    backoff_policy: BackoffPolicy,
    /// Fixed jitter seed for deterministic retry tests.
    jitter_seed: Option<u64>,
}

impl OcrClient {
    pub fn new(config: OcrConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LingoError::internal(format!("failed to build HTTP client: {e}")))?;

        let backoff_policy = BackoffPolicy::default().with_max_attempts(config.max_retries);
        Ok(Self {
            http,
            semaphore: Semaphore::new(config.concurrency.max(1)),
            config,
            metrics: Mutex::new(MetricsInner::default()),
            backoff_policy,
            jitter_seed: None,
        })
    }

    /// Pin the retry jitter; used by tests that assert sleep windows.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn metrics(&self) -> OcrMetrics {
        let inner = self.metrics.lock();
        OcrMetrics {
            requests: inner.requests,
            successes: inner.successes,
            retries: inner.retries,
            auth_failures: inner.auth_failures,
            rate_limited: inner.rate_limited,
            timeouts: inner.timeouts,
            service_failures: inner.service_failures,
            protocol_failures: inner.protocol_failures,
            invalid_input: inner.invalid_input,
            mean_latency_ms: if inner.completed_calls == 0 {
                0.0
            } else {
                inner.total_latency.as_secs_f64() * 1000.0 / inner.completed_calls as f64
            },
        }
    }

    /// Submit page images and return the parsed layout response.
    ///
    /// Guards enforced before anything reaches the wire:
    /// - at most `max_images_per_request` images (`INVALID_INPUT`),
    /// - each image at most `max_image_bytes` (`INVALID_INPUT`),
    /// - a bearer token is configured (`AUTHENTICATION_REQUIRED`).
    pub async fn process(&self, images: &[Vec<u8>]) -> Result<OcrLayout> {
        self.validate_request(images)?;

        let token = self.config.token.clone().ok_or_else(|| {
            self.metrics.lock().auth_failures += 1;
            LingoError::AuthenticationRequired {
                message: "OCR_TOKEN is not configured".to_string(),
            }
        })?;

        let _permit = self.semaphore.acquire().await.unwrap();

        let mut backoff = match self.jitter_seed {
            Some(seed) => Backoff::with_seed(self.backoff_policy.clone(), seed),
            None => Backoff::new(self.backoff_policy.clone()),
        };

        let mut attempt = 0;
        loop {
            self.metrics.lock().requests += 1;
            let started = Instant::now();
            let outcome = self.send_once(images, &token).await;
            self.record_latency(started.elapsed());

            match outcome {
                Ok(layout) => {
                    self.metrics.lock().successes += 1;
                    debug!(pages = layout.pages.len(), "OCR request succeeded");
                    return Ok(layout);
                }
                Err(err) => {
                    self.record_failure(&err);
                    let retry_after = match &err {
                        LingoError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    if err.is_retryable() && attempt + 1 < backoff.max_attempts() {
                        let delay = backoff.delay(attempt, retry_after);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            code = err.code(),
                            "OCR request failed, retrying"
                        );
                        self.metrics.lock().retries += 1;
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn validate_request(&self, images: &[Vec<u8>]) -> Result<()> {
        if images.is_empty() {
            self.metrics.lock().invalid_input += 1;
            return Err(LingoError::invalid_input("no images to process"));
        }
        if images.len() > self.config.max_images_per_request {
            self.metrics.lock().invalid_input += 1;
            return Err(LingoError::invalid_input(format!(
                "{} images exceed the per-request limit of {}",
                images.len(),
                self.config.max_images_per_request
            )));
        }
        if let Some((index, image)) = images
            .iter()
            .enumerate()
            .find(|(_, img)| img.len() > self.config.max_image_bytes)
        {
            self.metrics.lock().invalid_input += 1;
            return Err(LingoError::invalid_input(format!(
                "image {} is {} bytes, exceeding the {} byte limit",
                index,
                image.len(),
                self.config.max_image_bytes
            )));
        }
        Ok(())
    }

    async fn send_once(&self, images: &[Vec<u8>], token: &str) -> Result<OcrLayout> {
        let mut form = Form::new();
        for (index, image) in images.iter().enumerate() {
            let part = Part::bytes(image.clone())
                .file_name(format!("page-{index}.png"))
                .mime_str("image/png")
                .map_err(|e| LingoError::internal(format!("invalid mime type: {e}")))?;
            form = form.part("images", part);
        }

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LingoError::Timeout {
                        seconds: self.config.timeout_sec,
                    }
                } else {
                    LingoError::ServiceUnavailable {
                        message: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(|e| LingoError::Protocol {
                message: format!("failed to read response body: {e}"),
            })?;
            return serde_json::from_slice(&body).map_err(|e| LingoError::Protocol {
                message: format!("malformed OCR response: {e}"),
            });
        }

        Err(classify_status(status, retry_after_header(&response)))
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut metrics = self.metrics.lock();
        metrics.total_latency += elapsed;
        metrics.completed_calls += 1;
    }

    fn record_failure(&self, err: &LingoError) {
        let mut metrics = self.metrics.lock();
        match err {
            LingoError::AuthenticationFailed { .. } | LingoError::AuthenticationRequired { .. } => {
                metrics.auth_failures += 1;
            }
            LingoError::RateLimited { .. } => metrics.rate_limited += 1,
            LingoError::Timeout { .. } => metrics.timeouts += 1,
            LingoError::ServiceUnavailable { .. } => metrics.service_failures += 1,
            LingoError::Protocol { .. } => metrics.protocol_failures += 1,
            _ => {}
        }
    }
}

/// Map an HTTP error status onto the stable error surface.
fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> LingoError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LingoError::AuthenticationFailed {
            message: format!("OCR service answered {status}"),
        },
        StatusCode::TOO_MANY_REQUESTS => LingoError::RateLimited { retry_after },
        s if s.is_server_error() => LingoError::ServiceUnavailable {
            message: format!("OCR service answered {s}"),
        },
        s => LingoError::Protocol {
            message: format!("unexpected OCR status {s}"),
        },
    }
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
