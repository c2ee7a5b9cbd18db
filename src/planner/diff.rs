//! Set differencing between desired and actual membership.
//!
//! The differencer is pure: no I/O and no normalization. Member equality is
//! byte-exact.

use serde::Serialize;
use tracing::debug;

use crate::membership::MemberSet;

/// The add/remove partition that turns an actual set into a desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Delta {
    /// Members to attach.
    pub to_add: MemberSet,
    /// Members to detach.
    pub to_remove: MemberSet,
}

/// Computes deltas between membership sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Differencer;

impl Differencer {
    /// Creates a new differencer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the delta for an exhaustively managed set.
    ///
    /// Every actual member not desired is removed and every desired member
    /// not present is added.
    #[must_use]
    pub fn diff(&self, desired: &MemberSet, actual: &MemberSet) -> Delta {
        let delta = Delta {
            to_add: desired.difference(actual),
            to_remove: actual.difference(desired),
        };
        debug!(
            "Diff: {} to add, {} to remove",
            delta.to_add.len(),
            delta.to_remove.len()
        );
        delta
    }

    /// Computes the delta for a set that is only partially managed.
    ///
    /// Only members in `owned` (the set previously applied by this tool) may
    /// be removed. Members attached out-of-band are left in place.
    #[must_use]
    pub fn diff_owned(&self, desired: &MemberSet, actual: &MemberSet, owned: &MemberSet) -> Delta {
        let delta = Delta {
            to_add: desired.difference(actual),
            to_remove: actual.intersection(owned).difference(desired),
        };
        debug!(
            "Diff (non-exhaustive): {} to add, {} to remove",
            delta.to_add.len(),
            delta.to_remove.len()
        );
        delta
    }
}

impl Delta {
    /// Returns true if there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Returns the total number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }

    /// Returns the set obtained by applying this delta to `actual`.
    #[must_use]
    pub fn apply_to(&self, actual: &MemberSet) -> MemberSet {
        actual.difference(&self.to_remove).union(&self.to_add)
    }
}

impl std::fmt::Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} -{}", self.to_add, self.to_remove)
    }
}
