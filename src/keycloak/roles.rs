//! Role set adapters.
//!
//! Role composites, default roles, group role mappings and service-account
//! grants all expose the same shape: a role collection that is read with GET
//! and changed by POSTing or DELETEing an array of role representations.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::membership::{MemberId, MemberSet, ParentRef, RemoteSetClient};

use super::client::KeycloakClient;
use super::types::{RoleRepresentation, UserRepresentation};
use super::{to_body, tolerate_conflict, tolerate_not_found};

/// The role collection a [`RoleSetClient`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTarget {
    /// Composites of a role, keyed by role id. Parent is a role id.
    Composites,
    /// Realm roles composed into the realm's default role, keyed by name.
    /// Parent is the default role's id.
    DefaultRole,
    /// Realm roles mapped to a group, keyed by name.
    Group,
    /// Realm roles granted to a client's service account, keyed by name.
    /// Parent is the client's internal id.
    ServiceAccount,
}

/// A role collection of one parent.
#[derive(Debug, Clone)]
pub struct RoleSetClient {
    client: Arc<KeycloakClient>,
    target: RoleTarget,
}

impl RoleTarget {
    /// Returns true if members are role ids rather than realm role names.
    #[must_use]
    pub const fn keyed_by_id(self) -> bool {
        matches!(self, Self::Composites)
    }
}

impl RoleSetClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>, target: RoleTarget) -> Self {
        Self { client, target }
    }

    /// Resolves the path of the role collection.
    async fn collection(&self, parent: &ParentRef) -> Result<Vec<String>> {
        let id = parent.parent_id.clone();
        let path = match self.target {
            RoleTarget::Composites | RoleTarget::DefaultRole => {
                vec![String::from("roles-by-id"), id, String::from("composites")]
            }
            RoleTarget::Group => vec![
                String::from("groups"),
                id,
                String::from("role-mappings"),
                String::from("realm"),
            ],
            RoleTarget::ServiceAccount => {
                let user: UserRepresentation = self
                    .client
                    .get(parent.realm(), &["clients", id.as_str(), "service-account-user"])
                    .await?;
                debug!("Service account of {parent} is user {}", user.id);
                vec![
                    String::from("users"),
                    user.id,
                    String::from("role-mappings"),
                    String::from("realm"),
                ]
            }
        };
        Ok(path)
    }

    /// Resolves a member to its role representation.
    async fn role(&self, parent: &ParentRef, member: &MemberId) -> Result<RoleRepresentation> {
        if self.target.keyed_by_id() {
            self.client
                .get(parent.realm(), &["roles-by-id", member.as_str()])
                .await
        } else {
            self.client.realm_role(parent.realm(), member.as_str()).await
        }
    }

    /// Maps a listed role to its member key. Name-keyed targets manage realm
    /// roles only, so client roles in the listing are neither reported nor
    /// ever removed.
    fn member_of(&self, role: RoleRepresentation) -> Option<String> {
        if self.target.keyed_by_id() {
            Some(role.id)
        } else {
            (!role.client_role).then_some(role.name)
        }
    }
}

#[async_trait]
impl RemoteSetClient for RoleSetClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let path = self.collection(parent).await?;
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        let roles: Vec<RoleRepresentation> = self.client.get(parent.realm(), &path).await?;
        Ok(roles.into_iter().filter_map(|r| self.member_of(r)).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let role = self.role(parent, member).await?;
        let path = self.collection(parent).await?;
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        let body = json!([to_body(&role)?]);
        let result = self.client.post(parent.realm(), &path, &body).await;
        tolerate_conflict(result, parent, member)
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let role = match self.role(parent, member).await {
            Ok(role) => role,
            Err(e) if e.is_not_found() => {
                debug!("Role '{member}' no longer exists, nothing to detach");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let path = self.collection(parent).await?;
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        let body = json!([to_body(&role)?]);
        let result = self.client.delete(parent.realm(), &path, Some(&body)).await;
        tolerate_not_found(result, parent, member)
    }
}
