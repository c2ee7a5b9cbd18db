//! Keycloak admin API representations.
//!
//! Only the fields the adapters read or must send back are modeled; unknown
//! fields are ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A realm user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    /// Internal user id.
    pub id: String,
    /// Username, stored lowercased by Keycloak.
    pub username: String,
}

/// A realm group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRepresentation {
    /// Internal group id.
    pub id: String,
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Full group path.
    #[serde(default)]
    pub path: Option<String>,
}

/// A client scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientScopeRepresentation {
    /// Internal scope id.
    pub id: String,
    /// Scope name.
    pub name: String,
    /// Protocol the scope applies to.
    #[serde(default)]
    pub protocol: Option<String>,
}

/// A realm or client role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRepresentation {
    /// Internal role id.
    pub id: String,
    /// Role name.
    pub name: String,
    /// Whether this is a client role.
    #[serde(default)]
    pub client_role: bool,
    /// Id of the realm or client that owns the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// A client, as returned by client listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRepresentation {
    /// Internal client id.
    pub id: String,
    /// Public client identifier.
    pub client_id: String,
}

/// Fine-grained admin permissions of an identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementPermissions {
    /// Whether permissions are enabled for the provider.
    #[serde(default)]
    pub enabled: bool,
    /// Authorization resource representing the provider.
    #[serde(default)]
    pub resource: Option<String>,
    /// Scope name to permission id.
    #[serde(default)]
    pub scope_permissions: HashMap<String, String>,
}

/// A client authorization policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPolicyRepresentation {
    /// Policy id, absent before creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique policy name.
    pub name: String,
    /// Decision strategy.
    pub decision_strategy: String,
    /// Logic.
    pub logic: String,
    /// Policy type, always `client`.
    #[serde(rename = "type")]
    pub policy_type: String,
    /// Internal ids of the clients the policy grants.
    #[serde(default)]
    pub clients: Vec<String>,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// A scope-based authorization permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRepresentation {
    /// Permission id.
    pub id: String,
    /// Permission name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Decision strategy.
    #[serde(default)]
    pub decision_strategy: String,
    /// Permission type, e.g. `scope`.
    #[serde(rename = "type")]
    pub permission_type: String,
    /// Associated policy ids.
    #[serde(default)]
    pub policies: Vec<String>,
    /// Associated resource ids.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Associated scope ids.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Reference to an authorization entity in association listings.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRef {
    /// Entity id. Resources report it as `_id`.
    #[serde(alias = "_id")]
    pub id: String,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

impl ClientPolicyRepresentation {
    /// Builds a new positive, unanimous client policy.
    #[must_use]
    pub fn new(name: impl Into<String>, clients: Vec<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            decision_strategy: String::from("UNANIMOUS"),
            logic: String::from("POSITIVE"),
            policy_type: String::from("client"),
            clients,
            description: String::new(),
        }
    }
}
