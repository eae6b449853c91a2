use std::time::Duration;
use thiserror::Error;

/// Failure of a single HTTP exchange. Surfaced per target; never aborts the scan.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl RequestError {
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        RequestError::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }

    /// Classify a reqwest error, using `timeout` to report the configured bound.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(timeout)
        } else if err.is_connect() {
            RequestError::Connect(err.to_string())
        } else if err.is_builder() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            RequestError::InvalidUrl { url, reason: err.to_string() }
        } else if err.is_body() || err.is_decode() {
            RequestError::Body(err.to_string())
        } else {
            RequestError::Transport(err.to_string())
        }
    }
}

/// Failure inside one probe. Only ever converted into a null fragment.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("no host in url {0}")]
    MissingHost(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{0}")]
    Parse(String),
}

/// Failure while bringing the CDN dataset online. Logged, then the classifier
/// falls back to the stale cache or an empty table.
#[derive(Debug, Error)]
pub enum ClassifierLoadError {
    #[error("no per-user configuration directory available")]
    NoCacheDir,

    #[error("cache io: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("dataset endpoint answered with status {0}")]
    Status(u16),

    #[error("dataset is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
}
