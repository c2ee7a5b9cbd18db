//! Token-exchange client grants of an identity provider.
//!
//! Enabling fine-grained permissions on an identity provider makes Keycloak
//! create a `token-exchange` scope permission on the `realm-management`
//! client. The clients allowed to exchange tokens are the clients of the one
//! client policy attached to that permission. The policy is created on the
//! first grant and deleted with the last one.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::conflict::{CandidateName, ConflictResolver, NamedCreator};
use crate::error::{KcSyncError, RemoteError, Result};
use crate::membership::{MemberId, MemberSet, ParentRef, RemoteSetClient};

use super::client::KeycloakClient;
use super::tolerate_not_found;
use super::to_body;
use super::types::{
    ClientPolicyRepresentation, EntityRef, ManagementPermissions, PermissionRepresentation,
};

/// Client holding the authorization settings of a realm.
const REALM_MANAGEMENT_CLIENT: &str = "realm-management";

/// Scope permission created for an identity provider.
const TOKEN_EXCHANGE_SCOPE: &str = "token-exchange";

/// Clients allowed to exchange tokens of an identity provider, keyed by
/// internal client id. The parent id is the provider alias.
#[derive(Debug, Clone)]
pub struct TokenExchangeClientsClient {
    client: Arc<KeycloakClient>,
    resolver: ConflictResolver,
}

/// The token-exchange permission of one provider.
struct ExchangePermission {
    /// Internal id of the `realm-management` client.
    resource_server: String,
    /// The permission, with its associations filled in.
    permission: PermissionRepresentation,
}

/// Creates the client policy for a provider's first grant.
struct PolicyCreator<'a> {
    client: &'a KeycloakClient,
    realm: &'a str,
    resource_server: &'a str,
    first_client: &'a MemberId,
}

impl TokenExchangeClientsClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>) -> Self {
        Self::with_resolver(client, ConflictResolver::new())
    }

    /// Creates a new adapter with a specific conflict resolver.
    #[must_use]
    pub const fn with_resolver(client: Arc<KeycloakClient>, resolver: ConflictResolver) -> Self {
        Self { client, resolver }
    }

    async fn management_permissions(&self, parent: &ParentRef) -> Result<ManagementPermissions> {
        self.client
            .get(parent.realm(), &permissions_path(parent))
            .await
    }

    async fn enable_permissions(&self, parent: &ParentRef) -> Result<()> {
        self.client
            .put(
                parent.realm(),
                &permissions_path(parent),
                Some(&json!({ "enabled": true })),
            )
            .await
    }

    async fn exchange_permission(
        &self,
        parent: &ParentRef,
        permissions: &ManagementPermissions,
    ) -> Result<ExchangePermission> {
        let realm = parent.realm();
        let permission_id = permissions
            .scope_permissions
            .get(TOKEN_EXCHANGE_SCOPE)
            .ok_or_else(|| {
                KcSyncError::Remote(RemoteError::invalid_response(format!(
                    "identity provider '{}' has no '{TOKEN_EXCHANGE_SCOPE}' permission",
                    parent.parent_id
                )))
            })?;

        let rm = self.client.client_by_client_id(realm, REALM_MANAGEMENT_CLIENT).await?;
        let server = rm.id.as_str();
        let pid = permission_id.as_str();

        let mut permission: PermissionRepresentation = self
            .client
            .get(realm, &authz_path(server, &["permission", pid]))
            .await?;
        let policies: Vec<EntityRef> = self
            .client
            .get(realm, &authz_path(server, &["policy", pid, "associatedPolicies"]))
            .await?;
        let resources: Vec<EntityRef> = self
            .client
            .get(realm, &authz_path(server, &["permission", pid, "resources"]))
            .await?;
        let scopes: Vec<EntityRef> = self
            .client
            .get(realm, &authz_path(server, &["permission", pid, "scopes"]))
            .await?;

        permission.policies = policies.into_iter().map(|p| p.id).collect();
        permission.resources = resources.into_iter().map(|r| r.id).collect();
        permission.scopes = scopes.into_iter().map(|s| s.id).collect();

        Ok(ExchangePermission {
            resource_server: rm.id,
            permission,
        })
    }

    async fn client_policy(
        &self,
        realm: &str,
        exchange: &ExchangePermission,
    ) -> Result<Option<ClientPolicyRepresentation>> {
        match exchange.permission.policies.as_slice() {
            [] => Ok(None),
            [policy_id] => {
                let policy = self
                    .client
                    .get(
                        realm,
                        &authz_path(&exchange.resource_server, &["policy", "client", policy_id.as_str()]),
                    )
                    .await?;
                Ok(Some(policy))
            }
            many => Err(KcSyncError::Remote(RemoteError::invalid_response(format!(
                "only one client policy is supported, but {} were found",
                many.len()
            )))),
        }
    }

    async fn update_permission(&self, realm: &str, exchange: &ExchangePermission) -> Result<()> {
        let permission = &exchange.permission;
        self.client
            .put(
                realm,
                &authz_path(
                    &exchange.resource_server,
                    &["permission", permission.permission_type.as_str(), permission.id.as_str()],
                ),
                Some(&to_body(permission)?),
            )
            .await
    }

    async fn update_policy(
        &self,
        realm: &str,
        resource_server: &str,
        policy: &ClientPolicyRepresentation,
    ) -> Result<()> {
        let policy_id = policy.id.as_deref().unwrap_or_default();
        self.client
            .put(
                realm,
                &policy_path(resource_server, policy_id),
                Some(&to_body(policy)?),
            )
            .await
    }
}

#[async_trait]
impl RemoteSetClient for TokenExchangeClientsClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let permissions = self.management_permissions(parent).await?;
        if !permissions.enabled {
            debug!("Permissions of identity provider {parent} are disabled");
            return Ok(MemberSet::new());
        }
        let exchange = self.exchange_permission(parent, &permissions).await?;
        let policy = self.client_policy(parent.realm(), &exchange).await?;
        Ok(policy.map(|p| p.clients.into_iter().collect()).unwrap_or_default())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let realm = parent.realm();
        let mut permissions = self.management_permissions(parent).await?;
        if !permissions.enabled {
            info!("Enabling permissions of identity provider {parent}");
            self.enable_permissions(parent).await?;
            permissions = self.management_permissions(parent).await?;
        }

        let mut exchange = self.exchange_permission(parent, &permissions).await?;
        match self.client_policy(realm, &exchange).await? {
            None => {
                let creator = PolicyCreator {
                    client: &self.client,
                    realm,
                    resource_server: &exchange.resource_server,
                    first_client: member,
                };
                let candidate = CandidateName::new(parent.parent_id.as_str(), "_idp_client_policy");
                let policy_id = self
                    .resolver
                    .create_with_conflict_handling(&creator, candidate)
                    .await?;
                exchange.permission.policies = vec![policy_id];
                self.update_permission(realm, &exchange).await
            }
            Some(policy) if policy.clients.iter().any(|c| c == member.as_str()) => {
                debug!("'{member}' already attached to {parent}");
                Ok(())
            }
            Some(mut policy) => {
                policy.clients.push(member.to_string());
                self.update_policy(realm, &exchange.resource_server, &policy).await
            }
        }
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let realm = parent.realm();
        let permissions = self.management_permissions(parent).await?;
        if !permissions.enabled {
            return Ok(());
        }

        let mut exchange = self.exchange_permission(parent, &permissions).await?;
        let Some(mut policy) = self.client_policy(realm, &exchange).await? else {
            return Ok(());
        };
        if !policy.clients.iter().any(|c| c == member.as_str()) {
            debug!("'{member}' already detached from {parent}");
            return Ok(());
        }

        policy.clients.retain(|c| c != member.as_str());
        if !policy.clients.is_empty() {
            return self.update_policy(realm, &exchange.resource_server, &policy).await;
        }

        // A client policy must grant at least one client.
        exchange.permission.policies.clear();
        self.update_permission(realm, &exchange).await?;
        let policy_id = policy.id.unwrap_or_default();
        let result = self
            .client
            .delete(realm, &policy_path(&exchange.resource_server, &policy_id), None)
            .await;
        tolerate_not_found(result, parent, member)
    }
}

#[async_trait]
impl NamedCreator for PolicyCreator<'_> {
    async fn create_named(&self, name: &str) -> Result<String> {
        let policy = ClientPolicyRepresentation::new(name, vec![self.first_client.to_string()]);
        let created: ClientPolicyRepresentation = self
            .client
            .post_json(
                self.realm,
                &authz_path(self.resource_server, &["policy", "client"]),
                &to_body(&policy)?,
            )
            .await?;
        created.id.ok_or_else(|| {
            KcSyncError::Remote(RemoteError::invalid_response(format!(
                "created policy '{name}' has no id"
            )))
        })
    }
}

fn permissions_path(parent: &ParentRef) -> [&str; 5] {
    [
        "identity-provider",
        "instances",
        parent.parent_id.as_str(),
        "management",
        "permissions",
    ]
}

/// Path under the authorization resource server of a client.
fn authz_path<'a>(resource_server: &'a str, tail: &[&'a str]) -> Vec<&'a str> {
    let mut path = vec!["clients", resource_server, "authz", "resource-server"];
    path.extend_from_slice(tail);
    path
}

fn policy_path<'a>(resource_server: &'a str, policy_id: &'a str) -> Vec<&'a str> {
    authz_path(resource_server, &["policy", "client", policy_id])
}
