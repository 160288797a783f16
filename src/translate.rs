use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TranslateError;
use crate::settings::Settings;

/// Remote translation boundary. One call translates one chunk.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslateError>;

    /// Language code of `text`.
    async fn detect(&self, text: &str) -> Result<String, TranslateError>;
}

/// Google Cloud Translation v2 over REST.
pub struct GoogleTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Deserialize)]
struct DetectData {
    detections: Vec<Vec<Detection>>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: Option<f64>,
}

impl GoogleTranslator {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        GoogleTranslator {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TranslateError> {
        let key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(TranslateError::MissingApiKey)?;
        Ok(Self::new(&settings.base_url, key))
    }

    async fn post<T: DeserializeOwned>(&self, url: &str, body: serde_json::Value) -> Result<T, TranslateError> {
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TranslateError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Translate for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, TranslateError> {
        let body = serde_json::json!({
            "q": text,
            "source": source,
            "target": target,
            "format": "text",
        });
        let parsed: TranslateResponse = self.post(&self.base_url, body).await?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| TranslateError::Malformed("no translations in response".to_string()))
    }

    async fn detect(&self, text: &str) -> Result<String, TranslateError> {
        let url = format!("{}/detect", self.base_url);
        let parsed: DetectResponse = self.post(&url, serde_json::json!({ "q": text })).await?;
        let best = parsed
            .data
            .detections
            .into_iter()
            .next()
            .and_then(|d| d.into_iter().next())
            .ok_or_else(|| TranslateError::Malformed("no detections in response".to_string()))?;
        debug!(language = %best.language, confidence = ?best.confidence, "language detected");
        Ok(best.language)
    }
}

/// Spacing between consecutive requests of one document.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Called before request number `index` (0-based) is sent.
    async fn before_request(&self, index: usize);
}

pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        FixedDelay { delay }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn before_request(&self, index: usize) {
        if index > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        RetryPolicy {
            max_retries: settings.max_retries,
            base_backoff: settings.base_backoff(),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Translate one chunk, backing off and retrying on retryable failures.
pub async fn translate_with_retry(
    translator: &dyn Translate,
    policy: RetryPolicy,
    text: &str,
    source: &str,
    target: &str,
) -> Result<String, TranslateError> {
    let mut attempt = 0;
    loop {
        match translator.translate(text, source, target).await {
            Ok(translated) => return Ok(translated),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "Translation attempt {}/{} failed ({}), backing off {:.1}s",
                    attempt + 1,
                    policy.max_retries,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
