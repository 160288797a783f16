use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation API key is not configured (set PSX_API_KEY or api_key in polling_extract.toml)")]
    MissingApiKey,
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected translation API response: {0}")]
    Malformed(String),
}

impl TranslateError {
    /// Rate limiting, server errors and dropped connections are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Status { status, .. } => *status == 429 || *status >= 500,
            TranslateError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}
