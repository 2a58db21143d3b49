use crate::dedup::GateConfig;
use crate::types::{FetchConfig, RelayError, Result, DEFAULT_RETRY_INTERVAL, MAX_INTERVAL_SECONDS};
use crate::utils;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to do with local state when the publish sink reports a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishFailurePolicy {
    /// Commit `last_seen_id` and enter cooldown as if the publish succeeded.
    #[default]
    Advance,
    /// Keep the old baseline so the same item is offered again next time.
    Retry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_redirects: usize,
    pub retry_interval_seconds: i64,
    pub history_window_hours: i64,
    pub history_limit: usize,
    pub reject_threshold: f64,
    pub warn_threshold: f64,
    pub on_publish_failure: PublishFailurePolicy,
    pub notify_webhook: Option<String>,
    pub publish_webhook: Option<String>,
    pub journal_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        let gate = GateConfig::default();
        Self {
            user_agent: fetch.user_agent,
            timeout_seconds: fetch.timeout_seconds,
            max_retries: fetch.max_retries,
            retry_delay_seconds: fetch.retry_delay_seconds,
            max_redirects: fetch.max_redirects,
            retry_interval_seconds: DEFAULT_RETRY_INTERVAL,
            history_window_hours: gate.window_hours,
            history_limit: gate.history_limit,
            reject_threshold: gate.reject_threshold,
            warn_threshold: gate.warn_threshold,
            on_publish_failure: PublishFailurePolicy::default(),
            notify_webhook: None,
            publish_webhook: None,
            journal_path: None,
        }
    }
}

impl Settings {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
            retry_delay_seconds: self.retry_delay_seconds,
            max_redirects: self.max_redirects,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            window_hours: self.history_window_hours,
            history_limit: self.history_limit,
            reject_threshold: self.reject_threshold,
            warn_threshold: self.warn_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub block: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    /// Seconds to hold off after a publish before listening again
    pub check_interval: i64,
    pub feeds: Vec<FeedConfig>,
    #[serde(default, alias = "flair")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub cycles: Vec<CycleConfig>,
}

impl GroupConfig {
    /// Every feed URL reachable from this group's cycles
    pub fn urls(&self) -> BTreeSet<&str> {
        self.cycles
            .iter()
            .flat_map(|cycle| cycle.feeds.iter().map(|feed| feed.url.as_str()))
            .collect()
    }
}

/// Export variables from a dotenv file, leaving ones already set untouched.
/// Returns `false` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("Loaded environment from {}", path.display());
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(RelayError::Config(format!("cannot read {}: {}", path.display(), e))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub settings: Settings,
    pub groups: Vec<GroupConfig>,
}

impl RelayConfig {
    /// Load and validate the YAML configuration, filling webhook URLs from the environment
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml_str(&raw)?;

        if config.settings.notify_webhook.is_none() {
            config.settings.notify_webhook = std::env::var("DISCORD_WEBHOOK_URL").ok();
        }
        if config.settings.publish_webhook.is_none() {
            config.settings.publish_webhook = std::env::var("RSS_RELAY_PUBLISH_WEBHOOK").ok();
        }

        info!(
            "Loaded {} groups ({} cycles) from {}",
            config.groups.len(),
            config.groups.iter().map(|g| g.cycles.len()).sum::<usize>(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(RelayError::Config("no groups configured".to_string()));
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(RelayError::Config("group with empty name".to_string()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(RelayError::Config(format!("duplicate group name: {}", group.name)));
            }
            for (index, cycle) in group.cycles.iter().enumerate() {
                if cycle.feeds.is_empty() {
                    return Err(RelayError::Config(format!(
                        "{} cycle {} has no feeds",
                        group.name, index
                    )));
                }
                if !(1..=MAX_INTERVAL_SECONDS).contains(&cycle.check_interval) {
                    return Err(RelayError::Config(format!(
                        "{} cycle {} needs a check_interval between 1 and {} seconds",
                        group.name, index, MAX_INTERVAL_SECONDS
                    )));
                }
                for feed in &cycle.feeds {
                    if !utils::url::is_valid_feed_url(&feed.url) {
                        return Err(RelayError::Config(format!(
                            "{} cycle {} has an invalid feed url: {}",
                            group.name, index, feed.url
                        )));
                    }
                }
            }
            debug!("Group {} validated ({} urls)", group.name, group.urls().len());
        }

        let s = &self.settings;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(s.reject_threshold) || !in_unit(s.warn_threshold) || s.warn_threshold > s.reject_threshold {
            return Err(RelayError::Config(format!(
                "thresholds must satisfy 0 <= warn ({}) <= reject ({}) <= 1",
                s.warn_threshold, s.reject_threshold
            )));
        }
        if !(1..=MAX_INTERVAL_SECONDS).contains(&s.retry_interval_seconds) {
            return Err(RelayError::Config(format!(
                "retry_interval_seconds must be between 1 and {}",
                MAX_INTERVAL_SECONDS
            )));
        }

        Ok(())
    }
}
