use crate::traits::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Operator-facing events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started { dry_run: bool },
    Stopped,
    Published { group: String, link: String },
    Duplicate { group: String, title: String, reason: String },
    SimilarityWarning { group: String, title: String, other: String, score: f64 },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Started { dry_run } => {
                write!(f, "Relay started in {} mode", if *dry_run { "dry-run" } else { "normal" })
            }
            Event::Stopped => write!(f, "Relay stopped"),
            Event::Published { group, link } => write!(f, "Posted {} to {}", link, group),
            Event::Duplicate { group, title, reason } => {
                write!(f, "Skipped \"{}\" for {}: {}", title, group, reason)
            }
            Event::SimilarityWarning { group, title, other, score } => write!(
                f,
                "Possible duplicate for {}: \"{}\" vs \"{}\" ({:.2})",
                group, title, other, score
            ),
        }
    }
}

/// Writes events to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) {
        info!("{}", event);
    }
}

/// Posts events to a Discord-style webhook as `{"content": ...}`
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> crate::types::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, webhook_url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &Event) {
        let message = event.to_string();
        debug!("Sending notification: {}", message);

        let result = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": message }))
            .send()
            .await
            .and_then(|response| response.error_for_status());

        if let Err(e) = result {
            warn!("Notification not delivered: {}", e);
        }
    }
}
