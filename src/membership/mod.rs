//! Membership data model and the remote collaborator contract.
//!
//! A membership set is the collection of child identities attached to one
//! parent entity (a group's users, a client's default scopes, a role's
//! composites). This module defines the value types the engine reasons about
//! and the [`RemoteSetClient`] trait each relation kind implements.

mod types;
mod remote;

#[cfg(test)]
pub(crate) mod testing;

pub use types::{MemberId, MemberSet, ParentRef, Scope};
pub use remote::RemoteSetClient;

#[cfg(test)]
pub use remote::MockRemoteSetClient;
