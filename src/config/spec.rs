//! Configuration specification types for the sync system.
//!
//! This module defines the structs that map to the `kcsync.yaml` file. An
//! entry's `members` list is the desired state of one remote membership set.

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::identity::{RelationKind, TrackingId};
use crate::membership::{MemberSet, Scope};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Keycloak connection settings.
    pub keycloak: KeycloakConfig,
    /// Tracking state settings.
    #[serde(default)]
    pub state: StateConfig,
    /// Maximum number of sets reconciled concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Managed membership sets.
    #[serde(default)]
    pub memberships: Vec<MembershipEntry>,
}

/// Keycloak connection settings. Secrets are read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeycloakConfig {
    /// Server root URL.
    pub url: String,
    /// Path prefix, e.g. `/auth` on legacy distributions.
    #[serde(default)]
    pub base_path: String,
    /// Realm the admin client lives in.
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
    /// Admin client id.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Admin username. Selects the password grant when set.
    #[serde(default)]
    pub username: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Tracking state settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Path of the local state file.
    #[serde(default = "default_state_path")]
    pub path: String,
}

/// One managed membership set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipEntry {
    /// Realm of the parent.
    pub realm: String,
    /// Relation the set represents.
    pub kind: RelationKind,
    /// Parent identifier.
    pub parent: String,
    /// Desired members. Omitted means the entry is not reconciled; an empty
    /// list removes every member.
    #[serde(default)]
    pub members: Option<Vec<String>>,
    /// Whether members not listed are removed even if this tool never added
    /// them.
    #[serde(default = "default_exhaustive")]
    pub exhaustive: bool,
}

impl MembershipEntry {
    /// Returns the tracking identifier of this entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the realm or parent cannot be encoded.
    pub fn tracking_id(&self) -> Result<TrackingId, IdentityError> {
        TrackingId::new(Scope::new(self.realm.clone()), self.kind, self.parent.clone())
    }

    /// Returns the desired set, or `None` if no members are configured.
    #[must_use]
    pub fn desired(&self) -> Option<MemberSet> {
        self.members
            .as_ref()
            .map(|members| members.iter().map(String::as_str).collect())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

const fn default_parallelism() -> usize {
    4
}

fn default_auth_realm() -> String {
    String::from("master")
}

fn default_client_id() -> String {
    String::from("kcsync")
}

const fn default_timeout_secs() -> u64 {
    crate::keycloak::DEFAULT_TIMEOUT_SECS
}

fn default_state_path() -> String {
    String::from(".kcsync/state.json")
}

const fn default_exhaustive() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_omitted_members_differs_from_empty() {
        let yaml = r"
- realm: acme
  kind: group-memberships
  parent: g1
- realm: acme
  kind: group-memberships
  parent: g2
  members: []
";
        let entries: Vec<MembershipEntry> = serde_yaml::from_str(yaml).unwrap();
        assert!(entries[0].desired().is_none());
        assert_eq!(entries[1].desired(), Some(MemberSet::new()));
        assert!(entries[0].exhaustive);
    }

    #[test]
    fn test_tracking_id_of_entry() {
        let entry = MembershipEntry {
            realm: String::from("acme"),
            kind: RelationKind::DefaultScopes,
            parent: String::from("c1"),
            members: Some(vec![String::from("email")]),
            exhaustive: true,
        };
        assert_eq!(entry.tracking_id().unwrap().encode(), "acme/default-scopes/c1");
    }
}
