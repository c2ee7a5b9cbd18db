//! Tracking identifiers for reconciled membership sets.
//!
//! A [`TrackingId`] is the durable handle a host persists for one reconciled
//! set. Its textual form is `{realm}/{kind}/{parentId}`: plain segments joined
//! by `/`, with no escaping. Segments that contain the delimiter are rejected
//! when encoding, so decoding an encoded identifier always recovers the exact
//! segments it was built from.
//!
//! Adoption of a single grant uses the four-segment
//! `{realm}/{kind}/{parentId}/{member}` form, see [`MemberTrackingId`].
//!
//! Decoding is pure string parsing. Whether the parent still exists is only
//! discovered by the reconciler's fetch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IdentityError;
use crate::membership::{MemberId, ParentRef, Scope};

/// Segment delimiter.
pub const DELIMITER: char = '/';

/// Expected layout of a tracking identifier.
pub const TRACKING_ID_FORMAT: &str = "{realm}/{kind}/{parentId}";

/// Expected layout of a single-grant adoption identifier.
pub const MEMBER_TRACKING_ID_FORMAT: &str = "{realm}/{kind}/{parentId}/{member}";

/// The kind of parent/child relation a membership set represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// Users (by username) that are members of a group.
    GroupMemberships,
    /// Groups (by id) a user belongs to.
    UserGroups,
    /// Groups (by id) every new user of a realm joins.
    DefaultGroups,
    /// Client scopes (by name) attached to a client as defaults.
    DefaultScopes,
    /// Client scopes (by name) attached to a client as optional.
    OptionalScopes,
    /// Roles (by id) that are composites of a role.
    RoleComposites,
    /// Realm roles (by name) composed into a realm's default role.
    DefaultRoles,
    /// Realm roles (by name) mapped to a group.
    GroupRoles,
    /// Realm roles (by name) granted to a client's service account.
    ServiceAccountRoles,
    /// Clients (by id) allowed to exchange tokens of an identity provider.
    TokenExchangeClients,
}

/// Decoded form of a tracking identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingId {
    /// Realm the set lives in.
    pub scope: Scope,
    /// Relation the set represents.
    pub kind: RelationKind,
    /// Parent identifier within the realm.
    pub parent_id: String,
}

/// A tracking identifier narrowed to one member, used to adopt a single grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberTrackingId {
    /// The set the member belongs to.
    pub set: TrackingId,
    /// The adopted member.
    pub member: MemberId,
}

impl RelationKind {
    /// All relation kinds, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::GroupMemberships,
        Self::UserGroups,
        Self::DefaultGroups,
        Self::DefaultScopes,
        Self::OptionalScopes,
        Self::RoleComposites,
        Self::DefaultRoles,
        Self::GroupRoles,
        Self::ServiceAccountRoles,
        Self::TokenExchangeClients,
    ];

    /// Returns the identifier segment for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GroupMemberships => "group-memberships",
            Self::UserGroups => "user-groups",
            Self::DefaultGroups => "default-groups",
            Self::DefaultScopes => "default-scopes",
            Self::OptionalScopes => "optional-scopes",
            Self::RoleComposites => "role-composites",
            Self::DefaultRoles => "default-roles",
            Self::GroupRoles => "group-roles",
            Self::ServiceAccountRoles => "service-account-roles",
            Self::TokenExchangeClients => "token-exchange-clients",
        }
    }

    /// Describes what a member of this kind is, for messages.
    #[must_use]
    pub const fn member_label(self) -> &'static str {
        match self {
            Self::GroupMemberships => "username",
            Self::UserGroups | Self::DefaultGroups => "group id",
            Self::DefaultScopes | Self::OptionalScopes => "client scope name",
            Self::RoleComposites => "role id",
            Self::DefaultRoles | Self::GroupRoles | Self::ServiceAccountRoles => "realm role name",
            Self::TokenExchangeClients => "client id",
        }
    }

    /// Returns true if members of this kind must be lowercase.
    ///
    /// Keycloak lowercases usernames on write, so a mixed-case username can
    /// never match what the server reports.
    #[must_use]
    pub const fn requires_lowercase_members(self) -> bool {
        matches!(self, Self::GroupMemberships)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| IdentityError::UnknownRelation {
                kind: s.to_string(),
            })
    }
}

impl TrackingId {
    /// Builds a tracking identifier, validating that every segment encodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the realm or parent id is empty, contains `/`, or
    /// is not plain ASCII.
    pub fn new(
        scope: Scope,
        kind: RelationKind,
        parent_id: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let parent_id = parent_id.into();
        check_segment("realm", scope.as_str())?;
        check_segment("parent id", &parent_id)?;
        Ok(Self {
            scope,
            kind,
            parent_id,
        })
    }

    /// Encodes the identifier as `{realm}/{kind}/{parentId}`.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decodes a `{realm}/{kind}/{parentId}` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Malformed`] if the segment count is not exactly
    /// three or any segment is empty, [`IdentityError::UnknownRelation`]
    /// if the kind is not recognized, and [`IdentityError::NonAsciiSegment`]
    /// if the realm or parent id is not plain ASCII.
    pub fn decode(input: &str) -> Result<Self, IdentityError> {
        let segments = split_exact(input, 3, TRACKING_ID_FORMAT)?;
        let kind = segments[1].parse()?;
        check_ascii("realm", segments[0])?;
        check_ascii("parent id", segments[2])?;
        Ok(Self {
            scope: Scope::new(segments[0]),
            kind,
            parent_id: segments[2].to_string(),
        })
    }

    /// Returns the parent this identifier tracks.
    #[must_use]
    pub fn parent(&self) -> ParentRef {
        ParentRef::new(self.scope.clone(), self.parent_id.clone())
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.scope, self.kind, self.parent_id
        )
    }
}

impl FromStr for TrackingId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for TrackingId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TrackingId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

impl MemberTrackingId {
    /// Decodes a `{realm}/{kind}/{parentId}/{member}` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Malformed`] if the segment count is not exactly
    /// four or any segment is empty.
    pub fn decode(input: &str) -> Result<Self, IdentityError> {
        let segments = split_exact(input, 4, MEMBER_TRACKING_ID_FORMAT)?;
        let kind = segments[1].parse()?;
        check_ascii("realm", segments[0])?;
        check_ascii("parent id", segments[2])?;
        Ok(Self {
            set: TrackingId {
                scope: Scope::new(segments[0]),
                kind,
                parent_id: segments[2].to_string(),
            },
            member: MemberId::new(segments[3]),
        })
    }
}

impl fmt::Display for MemberTrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DELIMITER}{}", self.set, self.member)
    }
}

fn check_segment(name: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_empty() {
        return Err(IdentityError::EmptySegment { segment: name });
    }
    if value.contains(DELIMITER) {
        return Err(IdentityError::DelimiterInSegment {
            segment: name,
            value: value.to_string(),
        });
    }
    check_ascii(name, value)
}

fn check_ascii(name: &'static str, value: &str) -> Result<(), IdentityError> {
    if value.is_ascii() {
        Ok(())
    } else {
        Err(IdentityError::NonAsciiSegment {
            segment: name,
            value: value.to_string(),
        })
    }
}

fn split_exact<'a>(
    input: &'a str,
    arity: usize,
    expected: &'static str,
) -> Result<Vec<&'a str>, IdentityError> {
    let segments: Vec<&str> = input.split(DELIMITER).collect();
    if segments.len() != arity || segments.iter().any(|s| s.is_empty()) {
        return Err(IdentityError::Malformed {
            input: input.to_string(),
            expected,
        });
    }
    Ok(segments)
}
