//! State types for tracking reconciled membership sets.
//!
//! The state records, per tracking identifier, the member set kcsync last
//! applied. That record is what non-exhaustive entries use to decide which
//! members they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::identity::TrackingId;
use crate::membership::MemberSet;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1";

/// Maximum number of history entries kept.
pub const MAX_HISTORY: usize = 100;

/// The complete tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncState {
    /// State format version.
    pub version: String,
    /// Tracked sets keyed by encoded tracking identifier.
    #[serde(default)]
    pub tracked: BTreeMap<String, TrackedSet>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Run history (recent entries).
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// What kcsync last applied to one membership set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedSet {
    /// Members of the last applied desired set.
    pub members: MemberSet,
    /// Fingerprint of `members`.
    pub fingerprint: String,
    /// Whether the entry removes members it never added.
    #[serde(default = "default_exhaustive")]
    pub exhaustive: bool,
    /// When the set was last reconciled or imported.
    pub last_reconciled: DateTime<Utc>,
    /// Whether the final re-read matched the desired set.
    pub converged: bool,
}

/// A single entry in the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Unique identifier of the run.
    pub run_id: Uuid,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: SyncOperation,
    /// Tracking identifiers affected.
    pub tracking_ids: Vec<String>,
    /// Whether every affected set succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of recorded operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// `kcsync apply`.
    Apply,
    /// `kcsync import`.
    Import,
    /// `kcsync state rm`.
    Forget,
}

impl SyncState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            tracked: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a tracked set.
    #[must_use]
    pub fn get(&self, id: &TrackingId) -> Option<&TrackedSet> {
        self.tracked.get(&id.encode())
    }

    /// Records a tracked set, replacing any previous record.
    pub fn track(&mut self, id: &TrackingId, set: TrackedSet) {
        self.tracked.insert(id.encode(), set);
        self.last_updated = Utc::now();
    }

    /// Removes a tracked set, returning it if it was present.
    pub fn forget(&mut self, id: &TrackingId) -> Option<TrackedSet> {
        let result = self.tracked.remove(&id.encode());
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Members kcsync owns for a non-exhaustive entry.
    ///
    /// With no previous record nothing is owned.
    #[must_use]
    pub fn owned(&self, id: &TrackingId) -> MemberSet {
        self.get(id).map(|t| t.members.clone()).unwrap_or_default()
    }

    /// Adds a history entry, dropping the oldest beyond [`MAX_HISTORY`].
    pub fn add_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            let excess = self.history.len() + 1 - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.history.push(entry);
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedSet {
    /// Creates a record of an applied set.
    #[must_use]
    pub fn new(members: MemberSet, fingerprint: String, exhaustive: bool, converged: bool) -> Self {
        Self {
            members,
            fingerprint,
            exhaustive,
            last_reconciled: Utc::now(),
            converged,
        }
    }
}

impl HistoryEntry {
    /// Creates a new history entry.
    #[must_use]
    pub fn new(operation: SyncOperation, tracking_ids: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation,
            tracking_ids,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(operation: SyncOperation, tracking_ids: Vec<String>, error: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation,
            tracking_ids,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Apply => "apply",
            Self::Import => "import",
            Self::Forget => "forget",
        };
        write!(f, "{op}")
    }
}

const fn default_exhaustive() -> bool {
    true
}
