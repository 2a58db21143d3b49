//! Startup alignment of the persisted database with the current configuration.

use crate::config::GroupConfig;
use crate::state::{Database, GroupState, UpdateEntry};
use tracing::{debug, info, warn};

/// Bring `db` in line with `groups` as of `now`.
///
/// Groups present in the database but absent from the configuration are
/// left untouched for an operator to clean up.
pub fn reconcile(db: &mut Database, groups: &[GroupConfig], now: i64) {
    for group in groups {
        match db.group_mut(&group.name) {
            None => {
                info!("New group {}: {} cycles due immediately", group.name, group.cycles.len());
                db.groups
                    .insert(group.name.clone(), GroupState::with_cycles(group.cycles.len()));
            }
            Some(state) => reconcile_group(state, group, now),
        }
    }

    for name in db.groups.keys() {
        if !groups.iter().any(|g| &g.name == name) {
            warn!("State for {} has no matching group in the configuration; leaving it in place", name);
        }
    }
}

fn reconcile_group(state: &mut GroupState, group: &GroupConfig, now: i64) {
    let cycles = group.cycles.len();

    if state.update_entries.len() > cycles {
        info!(
            "{}: dropping {} update entries for removed cycles",
            group.name,
            state.update_entries.len() - cycles
        );
        state.update_entries.truncate(cycles);
    } else if state.update_entries.len() < cycles {
        info!(
            "{}: adding {} update entries for new cycles",
            group.name,
            cycles - state.update_entries.len()
        );
        state.update_entries.resize(cycles, UpdateEntry::fresh());
    }

    for (entry, cycle) in state.update_entries.iter_mut().zip(&group.cycles) {
        if entry.active_index >= cycle.feeds.len() {
            debug!("{}: active index {} out of range, restarting at 0", group.name, entry.active_index);
            entry.active_index = 0;
        }
        entry.due_time = entry.due_time.min(now.saturating_add(cycle.check_interval));
    }

    let reachable = group.urls();
    let before = state.sources.len();
    state.sources.retain(|url, _| reachable.contains(url.as_str()));
    if state.sources.len() != before {
        info!("{}: pruned {} unreachable sources", group.name, before - state.sources.len());
    }
}
