#![allow(dead_code)]

// Scripted stand-ins for the relay's collaborators

use async_trait::async_trait;
use rss_relay::config::{CycleConfig, FeedConfig, GroupConfig};
use rss_relay::notify::Event;
use rss_relay::state::Database;
use rss_relay::traits::{FeedTransport, ItemExtractor, Notifier, PublishSink, SimilarityModel};
use rss_relay::{
    reconcile, Collaborators, DuplicateGate, FeedItem, FetchOutcome, GateConfig, HistoryItem,
    PublishRequest, RelayError, Result, Scheduler, TrackerPolicy, Validators,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A fresh response whose body the [`PipeExtractor`] reads as `id|title|link`.
pub fn fresh(id: &str, title: &str, link: &str) -> FetchOutcome {
    FetchOutcome::Fresh {
        body: format!("{}|{}|{}", id, title, link),
        validators: Validators {
            etag: Some(format!("etag-{}", id)),
            last_modified: None,
        },
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<FetchOutcome>>>,
    calls: Mutex<Vec<(String, Validators)>>,
}

impl ScriptedTransport {
    pub fn push(&self, url: &str, outcome: FetchOutcome) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(String, Validators)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), validators.clone()));
        self.scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(FetchOutcome::NotModified)
    }
}

pub struct PipeExtractor;

impl ItemExtractor for PipeExtractor {
    fn extract(&self, body: &str) -> Result<FeedItem> {
        let parts: Vec<&str> = body.split('|').collect();
        match parts.as_slice() {
            [id, title, link] => Ok(FeedItem {
                id: id.to_string(),
                title: title.to_string(),
                link: link.to_string(),
            }),
            _ => Err(RelayError::Parse(format!("unreadable body: {}", body))),
        }
    }
}

/// Scores keyed by the historical title; anything else scores 0.
#[derive(Default)]
pub struct ScriptedSimilarity {
    scores: Mutex<HashMap<String, f64>>,
    fail: AtomicBool,
}

impl ScriptedSimilarity {
    pub fn set(&self, other_title: &str, score: f64) {
        self.scores.lock().unwrap().insert(other_title.to_string(), score);
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SimilarityModel for ScriptedSimilarity {
    async fn similarity(&self, _a: &str, b: &str) -> Result<f64> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Similarity("model offline".to_string()));
        }
        Ok(self.scores.lock().unwrap().get(b).copied().unwrap_or(0.0))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, PublishRequest)>>,
    history: Mutex<Vec<HistoryItem>>,
    fail_publish: AtomicBool,
    fail_history: AtomicBool,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<(String, PublishRequest)> {
        self.published.lock().unwrap().clone()
    }

    pub fn set_history(&self, history: Vec<HistoryItem>) {
        *self.history.lock().unwrap() = history;
    }

    pub fn fail_publishing(&self) {
        self.fail_publish.store(true, Ordering::SeqCst);
    }

    pub fn fail_history(&self) {
        self.fail_history.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublishSink for RecordingPublisher {
    async fn publish(&self, group: &str, request: &PublishRequest) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(RelayError::Publish {
                group: group.to_string(),
                reason: "sink down".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((group.to_string(), request.clone()));
        Ok(())
    }

    async fn recent_history(&self, _group: &str) -> Result<Vec<HistoryItem>> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(RelayError::HistoryUnavailable("history endpoint down".to_string()));
        }
        Ok(self.history.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn feed(url: &str) -> FeedConfig {
    FeedConfig {
        url: url.to_string(),
        block: Vec::new(),
    }
}

pub fn cycle(check_interval: i64, urls: &[&str]) -> CycleConfig {
    CycleConfig {
        check_interval,
        feeds: urls.iter().map(|u| feed(u)).collect(),
        tag: None,
    }
}

pub fn group(name: &str, cycles: Vec<CycleConfig>) -> GroupConfig {
    GroupConfig {
        name: name.to_string(),
        cycles,
    }
}

#[derive(Default)]
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub similarity: Arc<ScriptedSimilarity>,
    pub publisher: Arc<RecordingPublisher>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            transport: self.transport.clone(),
            extractor: Arc::new(PipeExtractor),
            gate: DuplicateGate::new(GateConfig::default(), self.similarity.clone()),
            publisher: self.publisher.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// Scheduler over a freshly reconciled, never persisted database
    pub fn scheduler(&self, groups: Vec<GroupConfig>, policy: TrackerPolicy) -> Scheduler {
        let mut db = Database::default();
        reconcile(&mut db, &groups, 0);
        Scheduler::new(groups, db, None, self.collaborators(), policy)
    }
}
