//! Keycloak admin API integration module.
//!
//! This module provides the HTTP client for the Keycloak admin REST API and
//! one [`RemoteSetClient`] adapter per [`RelationKind`]. Adapters translate
//! member identities (usernames, role names, scope names) to the internal
//! ids the API expects and make attach/detach idempotent.

mod client;
mod types;
mod groups;
mod scopes;
mod roles;
mod token_exchange;

pub use client::{ClientSettings, Credentials, KeycloakClient, DEFAULT_TIMEOUT_SECS};
pub use types::{
    ClientPolicyRepresentation, ClientRepresentation, ClientScopeRepresentation, EntityRef,
    GroupRepresentation, ManagementPermissions, PermissionRepresentation, RoleRepresentation,
    UserRepresentation,
};
pub use groups::{DefaultGroupsClient, GroupMembershipsClient, UserGroupsClient};
pub use scopes::{ClientScopesClient, ScopeAttachment};
pub use roles::{RoleSetClient, RoleTarget};
pub use token_exchange::TokenExchangeClientsClient;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{KcSyncError, Result};
use crate::identity::RelationKind;
use crate::membership::{MemberId, ParentRef, RemoteSetClient};

/// Page size for paginated listings.
const PAGE_SIZE: usize = 50;

/// Returns the adapter for a relation kind.
#[must_use]
pub fn set_client_for(kind: RelationKind, client: Arc<KeycloakClient>) -> Arc<dyn RemoteSetClient> {
    match kind {
        RelationKind::GroupMemberships => Arc::new(GroupMembershipsClient::new(client)),
        RelationKind::UserGroups => Arc::new(UserGroupsClient::new(client)),
        RelationKind::DefaultGroups => Arc::new(DefaultGroupsClient::new(client)),
        RelationKind::DefaultScopes => Arc::new(ClientScopesClient::new(client, ScopeAttachment::Default)),
        RelationKind::OptionalScopes => {
            Arc::new(ClientScopesClient::new(client, ScopeAttachment::Optional))
        }
        RelationKind::RoleComposites => Arc::new(RoleSetClient::new(client, RoleTarget::Composites)),
        RelationKind::DefaultRoles => Arc::new(RoleSetClient::new(client, RoleTarget::DefaultRole)),
        RelationKind::GroupRoles => Arc::new(RoleSetClient::new(client, RoleTarget::Group)),
        RelationKind::ServiceAccountRoles => {
            Arc::new(RoleSetClient::new(client, RoleTarget::ServiceAccount))
        }
        RelationKind::TokenExchangeClients => Arc::new(TokenExchangeClientsClient::new(client)),
    }
}

/// Treats "already attached" as success.
fn tolerate_conflict(result: Result<()>, parent: &ParentRef, member: &MemberId) -> Result<()> {
    match result {
        Err(e) if e.is_conflict() => {
            debug!("'{member}' already attached to {parent}");
            Ok(())
        }
        other => other,
    }
}

/// Treats "already detached" as success.
fn tolerate_not_found(result: Result<()>, parent: &ParentRef, member: &MemberId) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("'{member}' already detached from {parent}");
            Ok(())
        }
        other => other,
    }
}

/// Reads every page of a `first`/`max` paginated listing.
async fn fetch_paged<T: DeserializeOwned>(
    client: &KeycloakClient,
    realm: &str,
    path: &[&str],
) -> Result<Vec<T>> {
    let max = PAGE_SIZE.to_string();
    let mut items = Vec::new();
    let mut first = 0;

    loop {
        let offset = first.to_string();
        let page: Vec<T> = client
            .get_with_query(realm, path, &[("first", offset.as_str()), ("max", max.as_str())])
            .await?;
        let len = page.len();
        items.extend(page);
        if len < PAGE_SIZE {
            return Ok(items);
        }
        first += PAGE_SIZE;
    }
}

/// Serializes a request body.
fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| KcSyncError::internal(format!("Failed to serialize request body: {e}")))
}
