//! Per-cycle listening state machine.
//!
//! One call to [`advance`] moves a due [`UpdateEntry`] through exactly one
//! transition. Unseen URLs and cooldown exits only ever re-baseline; a publish
//! happens only while listening, on an id different from the baseline, and
//! after the duplicate gate accepts it.

use crate::config::{CycleConfig, PublishFailurePolicy};
use crate::dedup::{Decision, DuplicateGate, RejectReason, Verdict};
use crate::fetcher::conditional_fetch;
use crate::notify::Event;
use crate::state::{SourceRecord, UpdateEntry};
use crate::traits::{FeedTransport, ItemExtractor, Notifier, PublishSink};
use crate::types::{FeedItem, Probe, PublishRequest, DEFAULT_RETRY_INTERVAL};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The external pieces a scan talks to
pub struct Collaborators {
    pub transport: Arc<dyn FeedTransport>,
    pub extractor: Arc<dyn ItemExtractor>,
    pub gate: DuplicateGate,
    pub publisher: Arc<dyn PublishSink>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerPolicy {
    /// Delay before re-checking after anything other than a publish
    pub retry_interval: i64,
    pub on_publish_failure: PublishFailurePolicy,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            on_publish_failure: PublishFailurePolicy::Advance,
        }
    }
}

/// What happened to a cycle during one scan
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// First usable item of a URL recorded as its baseline
    Baselined,
    NoContent,
    ParseFailed,
    Unchanged,
    /// Cooldown ended; the current newest item became the baseline
    Rebaselined,
    Rejected(RejectReason),
    Published,
    PublishFailed,
}

/// Fetch and extract the newest item for `url`, updating validators on fresh content.
pub async fn probe(
    transport: &dyn FeedTransport,
    extractor: &dyn ItemExtractor,
    url: &str,
    record: &mut SourceRecord,
) -> Probe {
    match conditional_fetch(transport, url, record).await {
        None => Probe::Retryable("no fresh content".to_string()),
        Some(body) => match extractor.extract(&body) {
            Ok(item) => Probe::Fresh(item),
            Err(e) => Probe::Ignored(e.to_string()),
        },
    }
}

fn rebaseline(entry: &mut UpdateEntry, record: &mut SourceRecord, item: &FeedItem, now: i64, policy: &TrackerPolicy) {
    record.last_seen_id = Some(item.id.clone());
    entry.due_time = now.saturating_add(policy.retry_interval);
    entry.listening = true;
}

fn enter_cooldown(entry: &mut UpdateEntry, record: &mut SourceRecord, item: &FeedItem, cycle: &CycleConfig, now: i64) {
    record.last_seen_id = Some(item.id.clone());
    entry.due_time = now.saturating_add(cycle.check_interval);
    entry.listening = false;
    entry.active_index = (entry.active_index + 1) % cycle.feeds.len();
}

/// Run one transition for a due cycle.
pub async fn advance(
    services: &Collaborators,
    policy: &TrackerPolicy,
    group: &str,
    cycle: &CycleConfig,
    entry: &mut UpdateEntry,
    sources: &mut BTreeMap<String, SourceRecord>,
    now: i64,
) -> Transition {
    if entry.active_index >= cycle.feeds.len() {
        warn!("{}: active index {} out of range, restarting at 0", group, entry.active_index);
        entry.active_index = 0;
    }
    let feed = &cycle.feeds[entry.active_index];
    let url = feed.url.as_str();

    let record = sources.entry(url.to_string()).or_insert_with(|| {
        info!("Adding {} to the database for {}", url, group);
        SourceRecord::default()
    });

    let item = match probe(services.transport.as_ref(), services.extractor.as_ref(), url, record).await {
        Probe::Fresh(item) => item,
        Probe::Retryable(reason) => {
            debug!("{}: {} from {}, continuing to listen", group, reason, url);
            entry.due_time = now.saturating_add(policy.retry_interval);
            entry.listening = true;
            return Transition::NoContent;
        }
        Probe::Ignored(reason) => {
            warn!("{}: could not read newest item from {}: {}", group, url, reason);
            entry.due_time = now.saturating_add(policy.retry_interval);
            return Transition::ParseFailed;
        }
    };

    if record.last_seen_id.is_none() {
        info!("{}: baseline for {} is {}", group, url, item.id);
        rebaseline(entry, record, &item, now, policy);
        return Transition::Baselined;
    }

    if !entry.listening {
        info!("{}: cooldown over, listening to {} from {}", group, url, item.id);
        rebaseline(entry, record, &item, now, policy);
        return Transition::Rebaselined;
    }

    if record.last_seen_id.as_deref() == Some(item.id.as_str()) {
        debug!("{}: no new stories from {}", group, url);
        entry.due_time = now.saturating_add(policy.retry_interval);
        return Transition::Unchanged;
    }

    info!("{}: new story from {}: \"{}\"", group, url, item.title);
    let gate = &services.gate;
    let decision = match gate.check_blocklist(&item.title, &feed.block) {
        Some(reason) => Decision {
            verdict: Verdict::Reject(reason),
            warnings: Vec::new(),
        },
        None => {
            let history = services.publisher.recent_history(group).await;
            let at = DateTime::<Utc>::from_timestamp(now, 0).unwrap_or_else(Utc::now);
            gate.scan_history(&item, history, at).await
        }
    };

    for warning in &decision.warnings {
        services
            .notifier
            .notify(&Event::SimilarityWarning {
                group: group.to_string(),
                title: item.title.clone(),
                other: warning.title.clone(),
                score: warning.score,
            })
            .await;
    }

    if let Verdict::Reject(reason) = decision.verdict {
        info!("{}: skipping \"{}\": {}", group, item.title, reason);
        services
            .notifier
            .notify(&Event::Duplicate {
                group: group.to_string(),
                title: item.title.clone(),
                reason: reason.to_string(),
            })
            .await;
        rebaseline(entry, record, &item, now, policy);
        return Transition::Rejected(reason);
    }

    let request = PublishRequest {
        title: item.title.clone(),
        link: item.link.clone(),
        tag: cycle.tag.clone(),
    };

    match services.publisher.publish(group, &request).await {
        Ok(()) => {
            services
                .notifier
                .notify(&Event::Published {
                    group: group.to_string(),
                    link: item.link.clone(),
                })
                .await;
            enter_cooldown(entry, record, &item, cycle, now);
            Transition::Published
        }
        Err(e) => {
            error!("{}: publishing {} failed: {}", group, item.link, e);
            match policy.on_publish_failure {
                PublishFailurePolicy::Advance => enter_cooldown(entry, record, &item, cycle, now),
                PublishFailurePolicy::Retry => {
                    entry.due_time = now.saturating_add(policy.retry_interval);
                }
            }
            Transition::PublishFailed
        }
    }
}
