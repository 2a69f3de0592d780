//! HTTP JSON translation client.
//!
//! One POST per string, bounded by a semaphore (default width 8) and an
//! optional token bucket shared across all calls. Transient failures
//! retry with full-jitter backoff; batches fan out concurrently while
//! preserving input order and reporting per-item failures.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::config::TranslationConfig;
use crate::utils::{Backoff, BackoffPolicy, TokenBucket};
use crate::{LingoError, Result};

use super::Translator;

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translation: String,
}

/// Counters over the client's lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationMetrics {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
}

struct Inner {
    http: reqwest::Client,
    config: TranslationConfig,
    semaphore: Semaphore,
    limiter: Option<TokenBucket>,
    metrics: Mutex<TranslationMetrics>,
    backoff_policy: BackoffPolicy,
    jitter_seed: Option<u64>,
}

/// Translator backed by an HTTPS JSON endpoint.
#[derive(Clone)]
pub struct HttpTranslator {
    inner: Arc<Inner>,
}

impl HttpTranslator {
    pub fn new(config: TranslationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LingoError::internal(format!("failed to build HTTP client: {e}")))?;

        let limiter = config
            .rate_limit_rps
            .map(|rps| TokenBucket::new(rps, config.concurrency.max(1) as u32));
        let backoff_policy = BackoffPolicy::default().with_max_attempts(config.max_retries);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                semaphore: Semaphore::new(config.concurrency.max(1)),
                limiter,
                metrics: Mutex::new(TranslationMetrics::default()),
                backoff_policy,
                jitter_seed: None,
                config,
            }),
        })
    }

    /// Pin the retry jitter; used by tests that assert sleep windows.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("jitter seed must be set before the client is shared")
            .jitter_seed = Some(seed);
        self
    }

    pub fn metrics(&self) -> TranslationMetrics {
        self.inner.metrics.lock().clone()
    }

    async fn translate_with_retry(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let inner = &self.inner;
        let api_key = inner.config.api_key.as_deref().ok_or_else(|| {
            LingoError::AuthenticationRequired {
                message: "TRANSLATION_API_KEY is not configured".to_string(),
            }
        })?;

        let _permit = inner.semaphore.acquire().await.unwrap();

        let mut backoff = match inner.jitter_seed {
            Some(seed) => Backoff::with_seed(inner.backoff_policy.clone(), seed),
            None => Backoff::new(inner.backoff_policy.clone()),
        };

        let mut attempt = 0;
        loop {
            if let Some(limiter) = &inner.limiter {
                limiter.acquire().await;
            }

            inner.metrics.lock().requests += 1;
            match self.send_once(text, source_lang, target_lang, api_key).await {
                Ok(translated) => {
                    inner.metrics.lock().successes += 1;
                    return Ok(translated);
                }
                Err(err) => {
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
                            "translation call failed, retrying"
                        );
                        {
                            let mut metrics = inner.metrics.lock();
                            metrics.retries += 1;
                        }
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    inner.metrics.lock().failures += 1;
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        api_key: &str,
    ) -> Result<String> {
        let inner = &self.inner;
        let response = inner
            .http
            .post(&inner.config.endpoint)
            .bearer_auth(api_key)
            .json(&TranslateRequest {
                text,
                source_language: source_lang,
                target_language: target_lang,
            })
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LingoError::Timeout {
                        seconds: inner.config.timeout_sec,
                    }
                } else {
                    LingoError::ServiceUnavailable {
                        message: err.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let parsed: TranslateResponse =
                response.json().await.map_err(|e| LingoError::Protocol {
                    message: format!("malformed translation response: {e}"),
                })?;
            return Ok(parsed.translation);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LingoError::AuthenticationFailed {
                message: format!("translation service answered {status}"),
            },
            StatusCode::TOO_MANY_REQUESTS => LingoError::RateLimited { retry_after },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                LingoError::InvalidInput {
                    message: format!("translation service rejected the input ({status})"),
                }
            }
            s if s.is_server_error() => LingoError::ServiceUnavailable {
                message: format!("translation service answered {s}"),
            },
            s => LingoError::Protocol {
                message: format!("unexpected translation status {s}"),
            },
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    fn name(&self) -> &str {
        "http"
    }

    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String> {
        self.translate_with_retry(text, source_lang, target_lang).await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<Result<String>> {
        if texts.is_empty() {
            return vec![];
        }

        let mut tasks = JoinSet::new();
        for (index, text) in texts.iter().cloned().enumerate() {
            let client = self.clone();
            let source = source_lang.to_string();
            let target = target_lang.to_string();
            tasks.spawn(async move {
                let result = client.translate_with_retry(&text, &source, &target).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<String>>> = (0..texts.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(join_err) => {
                    // A panicked task loses its index; surface it in the
                    // first unfilled slot rather than aborting the batch.
                    warn!("translation task panicked: {join_err}");
                    if let Some(slot) = results.iter_mut().find(|r| r.is_none()) {
                        *slot = Some(Err(LingoError::internal(format!(
                            "translation task panicked: {join_err}"
                        ))));
                    }
                }
            }
        }

        debug!(count = texts.len(), "translation batch complete");
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(LingoError::internal("translation task vanished"))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(config: TranslationConfig) -> HttpTranslator {
        HttpTranslator::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let client = translator(TranslationConfig::default());
        let err = client.translate("hello", "en", "de").await.unwrap_err();
        assert_eq!(err.code(), "AUTHENTICATION_REQUIRED");
        // No request went out.
        assert_eq!(client.metrics().requests, 0);
    }

    #[tokio::test]
    async fn test_batch_result_length_matches_input() {
        let client = translator(TranslationConfig::default());
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = client.translate_batch(&texts, "en", "de").await;
        assert_eq!(results.len(), 3);
        // All fail the same way here (no key), but each slot is filled.
        for result in results {
            assert_eq!(result.unwrap_err().code(), "AUTHENTICATION_REQUIRED");
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let client = translator(TranslationConfig::default());
        assert!(client.translate_batch(&[], "en", "de").await.is_empty());
    }
}
