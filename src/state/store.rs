//! State store trait definition.

use async_trait::async_trait;

use super::types::SyncState;
use crate::error::Result;

/// Persistence backend for [`SyncState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the tracking state, or `None` before the first save.
    async fn load(&self) -> Result<Option<SyncState>>;

    /// Replaces the stored tracking state.
    async fn save(&self, state: &SyncState) -> Result<()>;

    /// Loads the state, or a fresh one if none exists.
    async fn load_or_default(&self) -> Result<SyncState> {
        Ok(self.load().await?.unwrap_or_default())
    }
}
