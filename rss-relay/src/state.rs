use crate::types::{RelayError, Result, Validators};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Polling position of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntry {
    /// Unix seconds at which the cycle is next checked
    pub due_time: i64,
    /// Which feed of the cycle is currently polled
    pub active_index: usize,
    /// `false` while cooling down after a publish
    pub listening: bool,
}

impl UpdateEntry {
    /// Fresh entry, due immediately
    pub fn fresh() -> Self {
        Self {
            due_time: 0,
            active_index: 0,
            listening: true,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.due_time
    }
}

/// Per-URL fetch state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_seen_id: Option<String>,
}

impl SourceRecord {
    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    pub fn set_validators(&mut self, validators: Validators) {
        self.etag = validators.etag;
        self.last_modified = validators.last_modified;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub update_entries: Vec<UpdateEntry>,
    pub sources: BTreeMap<String, SourceRecord>,
}

impl GroupState {
    pub fn with_cycles(count: usize) -> Self {
        Self {
            update_entries: vec![UpdateEntry::fresh(); count],
            sources: BTreeMap::new(),
        }
    }
}

/// Everything the relay remembers between runs, keyed by group name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database {
    pub groups: BTreeMap<String, GroupState>,
}

impl Database {
    /// Load the state file. A missing file yields an empty database; anything
    /// that cannot be decoded is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting with an empty database", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(RelayError::CorruptState {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let db: Self = serde_json::from_str(&raw).map_err(|e| RelayError::CorruptState {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("Loaded state for {} groups from {}", db.groups.len(), path.display());
        Ok(db)
    }

    /// Write the state file through a temporary sibling so a crash never leaves half a file.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        utils::fs::write_atomic(path, json.as_bytes())?;

        debug!("Persisted state for {} groups to {}", self.groups.len(), path.display());
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&GroupState> {
        self.groups.get(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut GroupState> {
        self.groups.get_mut(name)
    }
}
