use crate::notify::Event;
use crate::types::{FeedItem, FetchOutcome, HistoryItem, PublishRequest, Result, Validators};
use async_trait::async_trait;

/// Trait for the network side of a conditional fetch
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Perform a GET carrying the given validators.
    /// Must translate every transport failure into `FetchOutcome::Failed`.
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchOutcome;
}

/// Trait for pulling the newest item out of a feed document
pub trait ItemExtractor: Send + Sync {
    fn extract(&self, body: &str) -> Result<FeedItem>;
}

/// Trait for scoring how alike two titles are
#[async_trait]
pub trait SimilarityModel: Send + Sync {
    /// Symmetric score in [0, 1]; 1.0 means identical.
    async fn similarity(&self, a: &str, b: &str) -> Result<f64>;
}

/// Trait for the destination that items are published to
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, group: &str, request: &PublishRequest) -> Result<()>;

    /// Items previously published for `group`, newest first.
    async fn recent_history(&self, group: &str) -> Result<Vec<HistoryItem>>;
}

/// Trait for best-effort operator notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Never fails; implementations log and swallow their own errors.
    async fn notify(&self, event: &Event);
}
