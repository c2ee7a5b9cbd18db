//! In-memory remote set used by unit tests.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{KcSyncError, RemoteError, Result};

use super::remote::RemoteSetClient;
use super::types::{MemberId, MemberSet, ParentRef};

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch,
    Add(String),
    Remove(String),
}

/// Remote membership sets held in memory, with failure injection.
#[derive(Debug, Default)]
pub struct InMemorySetClient {
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
    calls: Mutex<Vec<Call>>,
    failing_adds: Mutex<HashSet<String>>,
    failing_removes: Mutex<HashSet<String>>,
    fail_fetch: Mutex<bool>,
}

impl InMemorySetClient {
    pub fn with_members(parent: &ParentRef, members: &[&str]) -> Self {
        let client = Self::default();
        client.sets.lock().unwrap().insert(
            parent.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
        client
    }

    pub fn members(&self, parent: &ParentRef) -> Vec<String> {
        self.sets
            .lock()
            .unwrap()
            .get(&parent.to_string())
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail_add(&self, member: &str) {
        self.failing_adds.lock().unwrap().insert(member.to_string());
    }

    pub fn fail_remove(&self, member: &str) {
        self.failing_removes.lock().unwrap().insert(member.to_string());
    }

    pub fn heal(&self) {
        self.failing_adds.lock().unwrap().clear();
        self.failing_removes.lock().unwrap().clear();
        *self.fail_fetch.lock().unwrap() = false;
    }

    pub fn fail_fetch(&self) {
        *self.fail_fetch.lock().unwrap() = true;
    }

    /// Mutates the remote set without recording a call.
    pub fn inject(&self, parent: &ParentRef, member: &str) {
        self.sets
            .lock()
            .unwrap()
            .entry(parent.to_string())
            .or_default()
            .insert(member.to_string());
    }

    fn server_error(member: &str) -> KcSyncError {
        KcSyncError::Remote(RemoteError::api_error(500, format!("injected failure for {member}")))
    }
}

#[async_trait]
impl RemoteSetClient for InMemorySetClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        self.calls.lock().unwrap().push(Call::Fetch);
        if *self.fail_fetch.lock().unwrap() {
            return Err(KcSyncError::Remote(RemoteError::network("injected fetch failure")));
        }
        let sets = self.sets.lock().unwrap();
        let members = sets.get(&parent.to_string()).ok_or_else(|| {
            KcSyncError::Remote(RemoteError::NotFound {
                resource: parent.to_string(),
            })
        })?;
        Ok(members.iter().map(String::as_str).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Add(member.to_string()));
        if self.failing_adds.lock().unwrap().contains(member.as_str()) {
            return Err(Self::server_error(member.as_str()));
        }
        self.sets
            .lock()
            .unwrap()
            .entry(parent.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Remove(member.to_string()));
        if self.failing_removes.lock().unwrap().contains(member.as_str()) {
            return Err(Self::server_error(member.as_str()));
        }
        if let Some(set) = self.sets.lock().unwrap().get_mut(&parent.to_string()) {
            set.remove(member.as_str());
        }
        Ok(())
    }
}
