use crate::traits::PublishSink;
use crate::types::{HistoryItem, PublishRequest, RelayError, Result};
use crate::utils;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Newest-first record of what was published, per group.
pub struct PublishJournal {
    entries: RwLock<BTreeMap<String, VecDeque<HistoryItem>>>,
    /// Serialises file writes so snapshots land in the order they were taken
    write_lock: Mutex<()>,
    limit: usize,
    path: Option<PathBuf>,
}

impl PublishJournal {
    pub fn in_memory(limit: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
            limit,
            path: None,
        }
    }

    /// Journal backed by a JSON file; a missing file starts empty.
    pub fn open(path: PathBuf, limit: usize) -> Result<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened publish journal {}", path.display());

        Ok(Self {
            entries: RwLock::new(entries),
            write_lock: Mutex::new(()),
            limit,
            path: Some(path),
        })
    }

    pub async fn record(&self, group: &str, item: HistoryItem) -> Result<()> {
        let _writing = self.write_lock.lock().await;

        let snapshot = {
            let mut entries = self.entries.write().await;
            let history = entries.entry(group.to_string()).or_default();
            history.push_front(item);
            history.truncate(self.limit);

            match &self.path {
                Some(_) => Some(serde_json::to_vec_pretty(&*entries)?),
                None => None,
            }
        };

        if let (Some(path), Some(json)) = (self.path.clone(), snapshot) {
            tokio::task::spawn_blocking(move || utils::fs::write_atomic(&path, &json))
                .await
                .map_err(|e| RelayError::Io(std::io::Error::other(e)))??;
        }
        Ok(())
    }

    pub async fn history(&self, group: &str) -> Vec<HistoryItem> {
        self.entries
            .read()
            .await
            .get(group)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn history_item(request: &PublishRequest) -> HistoryItem {
    HistoryItem {
        link: request.link.clone(),
        title: request.title.clone(),
        published_at: Utc::now(),
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    group: &'a str,
    title: &'a str,
    link: &'a str,
    tag: Option<&'a str>,
}

/// Hands items to an HTTP endpoint that performs the actual posting
pub struct WebhookPublisher {
    client: Client,
    endpoint: String,
    journal: PublishJournal,
}

impl WebhookPublisher {
    pub fn new(endpoint: String, journal: PublishJournal, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self { client, endpoint, journal })
    }
}

#[async_trait]
impl PublishSink for WebhookPublisher {
    async fn publish(&self, group: &str, request: &PublishRequest) -> Result<()> {
        let payload = WebhookPayload {
            group,
            title: &request.title,
            link: &request.link,
            tag: request.tag.as_deref(),
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(RelayError::Publish {
                group: group.to_string(),
                reason: format!("endpoint answered HTTP {}", response.status().as_u16()),
            });
        }

        info!("Published {} to {}", request.link, group);
        if let Err(e) = self.journal.record(group, history_item(request)).await {
            warn!("Published {} but could not journal it: {}", request.link, e);
        }
        Ok(())
    }

    async fn recent_history(&self, group: &str) -> Result<Vec<HistoryItem>> {
        Ok(self.journal.history(group).await)
    }
}

/// Logs publishes instead of performing them; history stays in memory
pub struct DryRunPublisher {
    journal: PublishJournal,
}

impl DryRunPublisher {
    pub fn new(history_limit: usize) -> Self {
        Self {
            journal: PublishJournal::in_memory(history_limit),
        }
    }
}

#[async_trait]
impl PublishSink for DryRunPublisher {
    async fn publish(&self, group: &str, request: &PublishRequest) -> Result<()> {
        info!(
            "[dry-run] would publish \"{}\" ({}) to {} with tag {:?}",
            request.title, request.link, group, request.tag
        );
        self.journal.record(group, history_item(request)).await
    }

    async fn recent_history(&self, group: &str) -> Result<Vec<HistoryItem>> {
        Ok(self.journal.history(group).await)
    }
}
