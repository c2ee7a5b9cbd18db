//! State management module for kcsync.
//!
//! This module persists which membership sets kcsync manages and what it last
//! applied to each of them.

mod local;
mod store;
mod types;

pub use local::LocalStateStore;
pub use store::StateStore;
pub use types::{
    HistoryEntry, MAX_HISTORY, STATE_VERSION, SyncOperation, SyncState, TrackedSet,
};
