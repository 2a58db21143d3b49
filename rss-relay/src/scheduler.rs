use crate::config::GroupConfig;
use crate::notify::Event;
use crate::state::{Database, GroupState, UpdateEntry};
use crate::tracker::{self, Collaborators, TrackerPolicy, Transition};
use crate::types::Result;
use crate::utils::time;
use chrono::Duration;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tally of one scan, for the log line at the end of it
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub checked: usize,
    pub published: usize,
    pub rejected: usize,
    pub next_due: i64,
}

/// Owns the database and drives every cycle of every group.
pub struct Scheduler {
    groups: Vec<GroupConfig>,
    db: Database,
    /// `None` in dry-run mode: nothing is written
    db_path: Option<PathBuf>,
    services: Collaborators,
    policy: TrackerPolicy,
}

impl Scheduler {
    /// `db` is expected to be reconciled against `groups` already.
    pub fn new(
        groups: Vec<GroupConfig>,
        db: Database,
        db_path: Option<PathBuf>,
        services: Collaborators,
        policy: TrackerPolicy,
    ) -> Self {
        Self {
            groups,
            db,
            db_path,
            services,
            policy,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Advance every due cycle once and return when the earliest cycle is due next.
    pub async fn scan(&mut self, now: i64) -> ScanSummary {
        let mut summary = ScanSummary {
            next_due: i64::MAX,
            ..Default::default()
        };

        for group in &self.groups {
            debug!("Checking {}...", group.name);
            let state = self.db.groups.entry(group.name.clone()).or_insert_with(|| {
                warn!("{} missing from the database, starting it fresh", group.name);
                GroupState::with_cycles(group.cycles.len())
            });
            if state.update_entries.len() < group.cycles.len() {
                warn!(
                    "{} has {} update entries for {} cycles, adding fresh ones",
                    group.name,
                    state.update_entries.len(),
                    group.cycles.len()
                );
                state.update_entries.resize(group.cycles.len(), UpdateEntry::fresh());
            }
            let GroupState { update_entries, sources } = state;

            for (entry, cycle) in update_entries.iter_mut().zip(&group.cycles) {
                if entry.is_due(now) {
                    summary.checked += 1;
                    let transition =
                        tracker::advance(&self.services, &self.policy, &group.name, cycle, entry, sources, now)
                            .await;
                    match transition {
                        Transition::Published => summary.published += 1,
                        Transition::Rejected(_) => summary.rejected += 1,
                        _ => {}
                    }
                }
                summary.next_due = summary.next_due.min(entry.due_time);
            }
        }

        if summary.next_due == i64::MAX {
            summary.next_due = now.saturating_add(self.policy.retry_interval);
        }
        summary
    }

    /// Write the database unless running dry.
    pub fn persist(&self) -> Result<()> {
        match &self.db_path {
            Some(path) => self.db.persist(path),
            None => {
                debug!("Dry run, not persisting state");
                Ok(())
            }
        }
    }

    async fn scan_and_persist(&mut self) -> i64 {
        let now = time::now_timestamp();
        info!("[{}] Checking feeds...", time::format_timestamp(now));

        let summary = self.scan(now).await;
        info!(
            "Checked {} cycles: {} published, {} skipped as duplicates",
            summary.checked, summary.published, summary.rejected
        );

        if let Err(e) = self.persist() {
            error!("Failed to persist state: {}", e);
        }
        summary.next_due
    }

    async fn announce_start(&self) {
        self.services
            .notifier
            .notify(&Event::Started {
                dry_run: self.db_path.is_none(),
            })
            .await;
    }

    /// A single scan followed by persistence, bracketed by start and stop events.
    pub async fn run_once(&mut self) -> i64 {
        self.announce_start().await;
        let next_due = self.scan_and_persist().await;
        self.services.notifier.notify(&Event::Stopped).await;
        next_due
    }

    /// Scan, persist and sleep until `shutdown` fires, then flush once more.
    pub async fn run(mut self, shutdown: CancellationToken) {
        self.announce_start().await;

        while !shutdown.is_cancelled() {
            let next_due = self.scan_and_persist().await;
            info!("Next update at {}", time::format_timestamp(next_due));

            if !sleep_until(next_due, &shutdown).await {
                break;
            }
        }

        info!("Shutdown requested, flushing state");
        if let Err(e) = self.persist() {
            error!("Final flush failed: {}", e);
        }
        self.services.notifier.notify(&Event::Stopped).await;
    }
}

/// Sleep until the wall clock reaches `deadline`, re-reading it after every slice.
/// Returns `false` if `shutdown` fired first.
pub async fn sleep_until(deadline: i64, shutdown: &CancellationToken) -> bool {
    loop {
        let step = time::sleep_increment(deadline - time::now_timestamp());
        if step <= 0 {
            return true;
        }

        debug!("Sleeping for {}...", time::format_duration(Duration::seconds(step)));
        tokio::select! {
            _ = shutdown.cancelled() => return false,
            _ = tokio::time::sleep(std::time::Duration::from_secs(step as u64)) => {}
        }
    }
}
