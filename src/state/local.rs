//! JSON file state backend.
//!
//! The whole state lives in one pretty-printed file next to the config.
//! A save writes `<name>.tmp` first and renames it over the target, so a
//! crash mid-write leaves the previous state readable.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{KcSyncError, Result, StateError};

use super::store::StateStore;
use super::types::{STATE_VERSION, SyncState};

/// State store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    file: PathBuf,
}

impl LocalStateStore {
    /// Creates a store for the given file. Nothing is touched until the first save.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    /// Returns the path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file
    }

    fn corrupted(&self, what: &str, e: impl std::fmt::Display) -> KcSyncError {
        KcSyncError::State(StateError::Corrupted {
            message: format!("cannot {what} {}: {e}", self.file.display()),
        })
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<SyncState>> {
        let raw = match fs::read_to_string(&self.file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No tracking state at {}", self.file.display());
                return Ok(None);
            }
            Err(e) => return Err(self.corrupted("read", e)),
        };

        let state: SyncState = serde_json::from_str(&raw).map_err(|e| self.corrupted("parse", e))?;
        if state.version != STATE_VERSION {
            return Err(KcSyncError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version,
            }));
        }

        debug!("Loaded {} tracked set(s)", state.tracked.len());
        Ok(Some(state))
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(dir) = self.file.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::serialization(format!("cannot encode tracking state: {e}")))?;

        let staging = self.file.with_extension("tmp");
        let mut out = fs::File::create(&staging).await?;
        out.write_all(json.as_bytes()).await?;
        out.sync_all().await?;
        fs::rename(&staging, &self.file).await?;

        info!("Tracking state written to {}", self.file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RelationKind, TrackingId};
    use crate::membership::{MemberSet, Scope};
    use crate::state::TrackedSet;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> LocalStateStore {
        LocalStateStore::new(dir.path().join(".kcsync").join("state.json"))
    }

    #[tokio::test]
    async fn test_tracked_sets_survive_reload() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let id = TrackingId::new(Scope::new("acme"), RelationKind::DefaultScopes, "c1").unwrap();
        let members: MemberSet = ["email", "profile"].into_iter().collect();
        let mut state = SyncState::new();
        state.track(&id, TrackedSet::new(members.clone(), String::from("abc"), true, true));
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.owned(&id), members);
        assert_eq!(loaded, state);
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_means_no_state() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load().await.unwrap().is_none());
        assert!(store.load_or_default().await.unwrap().tracked.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_state() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id = TrackingId::new(Scope::new("acme"), RelationKind::GroupRoles, "g1").unwrap();

        let mut state = SyncState::new();
        state.track(&id, TrackedSet::new(MemberSet::new(), String::new(), true, true));
        store.save(&state).await.unwrap();
        state.forget(&id);
        store.save(&state).await.unwrap();

        assert!(store.load().await.unwrap().unwrap().tracked.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupted() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&SyncState::new()).await.unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, KcSyncError::State(StateError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_other_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut state = SyncState::new();
        state.version = String::from("0");
        store.save(&state).await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, KcSyncError::State(StateError::VersionMismatch { .. })));
    }
}
