//! Remote set client trait definition.
//!
//! This module defines the interface every relation kind implements so the
//! reconciler can read and mutate a membership set one member at a time.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

use super::types::{MemberId, MemberSet, ParentRef};

/// Per-member access to a remote membership set.
///
/// Implementations classify their own errors. A missing parent must surface
/// as [`RemoteError::NotFound`](crate::error::RemoteError::NotFound) from
/// [`fetch`](Self::fetch). `add` of a member already present and `remove` of
/// a member already absent must succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSetClient: Send + Sync {
    /// Reads the members currently attached to the parent.
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet>;

    /// Attaches a single member to the parent.
    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()>;

    /// Detaches a single member from the parent.
    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()>;
}

#[async_trait]
impl RemoteSetClient for Box<dyn RemoteSetClient> {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        (**self).fetch(parent).await
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        (**self).add(parent, member).await
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        (**self).remove(parent, member).await
    }
}

#[async_trait]
impl RemoteSetClient for Arc<dyn RemoteSetClient> {
    async fn fetch(&self, parent: &ParentRef) -> Result<MemberSet> {
        (**self).fetch(parent).await
    }

    async fn add(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        (**self).add(parent, member).await
    }

    async fn remove(&self, parent: &ParentRef, member: &MemberId) -> Result<()> {
        (**self).remove(parent, member).await
    }
}
