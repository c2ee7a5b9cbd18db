//! Group-related membership adapters.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::{KcSyncError, RemoteError, Result};
use crate::membership::{MemberId, MemberSet, ParentRef, RemoteSetClient};

use super::client::KeycloakClient;
use super::types::{GroupRepresentation, UserRepresentation};
use super::{fetch_paged, tolerate_conflict, tolerate_not_found};

/// Users of a group, keyed by username.
#[derive(Debug, Clone)]
pub struct GroupMembershipsClient {
    client: Arc<KeycloakClient>,
}

/// Groups a user belongs to, keyed by group id.
#[derive(Debug, Clone)]
pub struct UserGroupsClient {
    client: Arc<KeycloakClient>,
}

/// Default groups of a realm, keyed by group id. The parent id is the realm.
#[derive(Debug, Clone)]
pub struct DefaultGroupsClient {
    client: Arc<KeycloakClient>,
}

impl GroupMembershipsClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>) -> Self {
        Self { client }
    }

    async fn user_id(&self, parent: &ParentRef, username: &MemberId) -> Result<Option<String>> {
        let user = self
            .client
            .find_user_by_username(parent.realm(), username.as_str())
            .await?;
        Ok(user.map(|u| u.id))
    }
}

#[async_trait]
impl RemoteSetClient for GroupMembershipsClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let users: Vec<UserRepresentation> = fetch_paged(
            &self.client,
            parent.realm(),
            &["groups", parent.parent_id.as_str(), "members"],
        )
        .await?;
        debug!("Group {parent} has {} member(s)", users.len());
        Ok(users.into_iter().map(|u| u.username).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let Some(user_id) = self.user_id(parent, member).await? else {
            return Err(KcSyncError::Remote(RemoteError::NotFound {
                resource: format!("user '{member}' in realm '{}'", parent.realm()),
            }));
        };
        let result = self
            .client
            .put(parent.realm(), &["users", user_id.as_str(), "groups", parent.parent_id.as_str()], None)
            .await;
        tolerate_conflict(result, parent, member)
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let Some(user_id) = self.user_id(parent, member).await? else {
            debug!("User '{member}' no longer exists, nothing to detach");
            return Ok(());
        };
        let result = self
            .client
            .delete(parent.realm(), &["users", user_id.as_str(), "groups", parent.parent_id.as_str()], None)
            .await;
        tolerate_not_found(result, parent, member)
    }
}

impl UserGroupsClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSetClient for UserGroupsClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let groups: Vec<GroupRepresentation> = fetch_paged(
            &self.client,
            parent.realm(),
            &["users", parent.parent_id.as_str(), "groups"],
        )
        .await?;
        Ok(groups.into_iter().map(|g| g.id).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let result = self
            .client
            .put(parent.realm(), &["users", parent.parent_id.as_str(), "groups", member.as_str()], None)
            .await;
        tolerate_conflict(result, parent, member)
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let result = self
            .client
            .delete(parent.realm(), &["users", parent.parent_id.as_str(), "groups", member.as_str()], None)
            .await;
        tolerate_not_found(result, parent, member)
    }
}

impl DefaultGroupsClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSetClient for DefaultGroupsClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let groups: Vec<GroupRepresentation> =
            self.client.get(&parent.parent_id, &["default-groups"]).await?;
        Ok(groups.into_iter().map(|g| g.id).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let result = self
            .client
            .put(&parent.parent_id, &["default-groups", member.as_str()], None)
            .await;
        tolerate_conflict(result, parent, member)
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let result = self
            .client
            .delete(&parent.parent_id, &["default-groups", member.as_str()], None)
            .await;
        tolerate_not_found(result, parent, member)
    }
}
