//! Client scope attachment adapter.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::{KcSyncError, RemoteError, Result};
use crate::membership::{MemberId, MemberSet, ParentRef, RemoteSetClient};

use super::client::KeycloakClient;
use super::types::ClientScopeRepresentation;
use super::{tolerate_conflict, tolerate_not_found};

/// How a client scope is attached to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAttachment {
    /// Always included in tokens.
    Default,
    /// Included when requested.
    Optional,
}

/// Client scopes attached to a client, keyed by scope name.
#[derive(Debug, Clone)]
pub struct ClientScopesClient {
    client: Arc<KeycloakClient>,
    attachment: ScopeAttachment,
}

impl ScopeAttachment {
    /// Returns the collection segment under a client.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Default => "default-client-scopes",
            Self::Optional => "optional-client-scopes",
        }
    }
}

impl ClientScopesClient {
    /// Creates a new adapter.
    #[must_use]
    pub const fn new(client: Arc<KeycloakClient>, attachment: ScopeAttachment) -> Self {
        Self { client, attachment }
    }

    async fn scope_id(&self, parent: &ParentRef, name: &MemberId) -> Result<Option<String>> {
        let scope = self
            .client
            .find_client_scope(parent.realm(), name.as_str())
            .await?;
        Ok(scope.map(|s| s.id))
    }
}

#[async_trait]
impl RemoteSetClient for ClientScopesClient {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        let scopes: Vec<ClientScopeRepresentation> = self
            .client
            .get(
                parent.realm(),
                &["clients", parent.parent_id.as_str(), self.attachment.segment()],
            )
            .await?;
        Ok(scopes.into_iter().map(|s| s.name).collect())
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let Some(scope_id) = self.scope_id(parent, member).await? else {
            return Err(KcSyncError::Remote(RemoteError::NotFound {
                resource: format!("client scope '{member}' in realm '{}'", parent.realm()),
            }));
        };
        let result = self
            .client
            .put(
                parent.realm(),
                &[
                    "clients",
                    parent.parent_id.as_str(),
                    self.attachment.segment(),
                    scope_id.as_str(),
                ],
                None,
            )
            .await;
        tolerate_conflict(result, parent, member)
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        let Some(scope_id) = self.scope_id(parent, member).await? else {
            debug!("Client scope '{member}' no longer exists, nothing to detach");
            return Ok(());
        };
        let result = self
            .client
            .delete(
                parent.realm(),
                &[
                    "clients",
                    parent.parent_id.as_str(),
                    self.attachment.segment(),
                    scope_id.as_str(),
                ],
                None,
            )
            .await;
        tolerate_not_found(result, parent, member)
    }
}
