//! Accept/reject decision for a candidate item.
//!
//! The gate never touches the network: publish history is handed in by the
//! caller. A failure in one check never rejects: an unavailable history
//! accepts, a failing similarity model leaves only the link checks.

use crate::traits::SimilarityModel;
use crate::types::{FeedItem, HistoryItem, Result};
use crate::utils;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Only history newer than this many hours is compared against
    pub window_hours: i64,
    pub history_limit: usize,
    /// Scores strictly above this reject
    pub reject_threshold: f64,
    /// Scores strictly above this (and not rejecting) are reported
    pub warn_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            history_limit: 1000,
            reject_threshold: 0.8,
            warn_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Blocked { term: String },
    SameLink { link: String },
    SimilarTitle { title: String, score: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Blocked { term } => write!(f, "title contains blocked term \"{}\"", term),
            RejectReason::SameLink { link } => write!(f, "link already published as {}", link),
            RejectReason::SimilarTitle { title, score } => {
                write!(f, "title too similar ({:.2}) to \"{}\"", score, title)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// A near miss: similar enough to mention, not enough to reject.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityWarning {
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub verdict: Verdict,
    pub warnings: Vec<SimilarityWarning>,
}

impl Decision {
    fn accept(warnings: Vec<SimilarityWarning>) -> Self {
        Self { verdict: Verdict::Accept, warnings }
    }

    fn reject(reason: RejectReason, warnings: Vec<SimilarityWarning>) -> Self {
        Self { verdict: Verdict::Reject(reason), warnings }
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

pub struct DuplicateGate {
    config: GateConfig,
    similarity: Arc<dyn SimilarityModel>,
}

impl DuplicateGate {
    pub fn new(config: GateConfig, similarity: Arc<dyn SimilarityModel>) -> Self {
        Self { config, similarity }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// First blocklist term found in `title`, ignoring case.
    pub fn check_blocklist(&self, title: &str, blocklist: &[String]) -> Option<RejectReason> {
        blocklist
            .iter()
            .filter(|term| !term.is_empty())
            .find(|term| utils::text::contains_ignore_case(title, term))
            .map(|term| RejectReason::Blocked { term: term.clone() })
    }

    /// Compare `item` against newest-first publish history.
    ///
    /// Stops at the first entry older than the window, or after `history_limit` entries.
    /// An unavailable history accepts. A failing similarity model only skips the
    /// title comparison; links are still checked against every entry.
    pub async fn scan_history(
        &self,
        item: &FeedItem,
        history: Result<Vec<HistoryItem>>,
        now: DateTime<Utc>,
    ) -> Decision {
        let history = match history {
            Ok(history) => history,
            Err(e) => {
                warn!("History unavailable, accepting \"{}\": {}", item.title, e);
                return Decision::accept(Vec::new());
            }
        };

        let cutoff = now - Duration::hours(self.config.window_hours);
        let candidate_link = utils::url::strip_query(&item.link);
        let mut warnings = Vec::new();
        let mut model_available = true;

        for (scanned, past) in history.iter().take(self.config.history_limit).enumerate() {
            if past.published_at < cutoff {
                debug!("History scan stopped at window edge after {} items", scanned);
                break;
            }

            if item.link == past.link || candidate_link == utils::url::strip_query(&past.link) {
                return Decision::reject(RejectReason::SameLink { link: past.link.clone() }, warnings);
            }

            if !model_available {
                continue;
            }
            let score = match self.similarity.similarity(&item.title, &past.title).await {
                Ok(score) => score,
                Err(e) => {
                    warn!("Similarity check failed for \"{}\", comparing links only: {}", item.title, e);
                    model_available = false;
                    continue;
                }
            };

            if score > self.config.reject_threshold {
                return Decision::reject(
                    RejectReason::SimilarTitle { title: past.title.clone(), score },
                    warnings,
                );
            }
            if score > self.config.warn_threshold {
                warn!(
                    "\"{}\" resembles \"{}\" ({:.2}) but is below the reject threshold",
                    item.title, past.title, score
                );
                warnings.push(SimilarityWarning { title: past.title.clone(), score });
            }
        }

        Decision::accept(warnings)
    }
}
