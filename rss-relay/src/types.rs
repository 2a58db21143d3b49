use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before a source is checked again after an uneventful fetch.
pub const DEFAULT_RETRY_INTERVAL: i64 = 1800;

/// Longest check or retry interval a configuration may ask for (one year).
pub const MAX_INTERVAL_SECONDS: i64 = 365 * 24 * 3600;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "RSS-Relay/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
            max_redirects: 5,
        }
    }
}

/// Cache validators returned by the last fresh response for a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Raw result of one conditional GET.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fresh { body: String, validators: Validators },
    NotModified,
    Failed(String),
}

/// The newest item of a feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub id: String,
}

/// What a due source produced this scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// Fresh document with a usable newest item.
    Fresh(FeedItem),
    /// No content: not modified, non-2xx or transport failure.
    Retryable(String),
    /// Content arrived but no item could be extracted from it.
    Ignored(String),
}

/// A previously published item, as reported by the publish sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub link: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRequest {
    pub title: String,
    pub link: String,
    pub tag: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("State file {path} is unreadable ({reason}); remove or repair it before restarting")]
    CorruptState { path: String, reason: String },

    #[error("Publish failed for {group}: {reason}")]
    Publish { group: String, reason: String },

    #[error("Similarity model error: {0}")]
    Similarity(String),

    #[error("Publish history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
