//! Reconciliation plan types and construction.
//!
//! A plan orders a delta into single-member operations. All removals come
//! before all additions, so the remote set only ever passes through states
//! that are a superset or a subset of the desired set.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identity::TrackingId;
use crate::membership::MemberId;

use super::diff::Delta;

/// An ordered reconciliation plan for one tracked set.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcilePlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// The set this plan targets.
    pub tracking_id: TrackingId,
    /// Operations in execution order.
    pub operations: Vec<PlannedOperation>,
}

/// A single planned operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Member the operation applies to.
    pub member: MemberId,
}

/// Kinds of operations in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Detach a member.
    Remove,
    /// Attach a member.
    Add,
}

impl ReconcilePlan {
    /// Creates a plan from a delta, removals first.
    #[must_use]
    pub fn from_delta(tracking_id: TrackingId, delta: &Delta) -> Self {
        let removals = delta.to_remove.iter().map(|member| PlannedOperation {
            kind: OperationKind::Remove,
            member: member.clone(),
        });
        let additions = delta.to_add.iter().map(|member| PlannedOperation {
            kind: OperationKind::Add,
            member: member.clone(),
        });

        Self {
            created_at: Utc::now(),
            tracking_id,
            operations: removals.chain(additions).collect(),
        }
    }

    /// Returns true if the plan has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns the number of additions.
    #[must_use]
    pub fn add_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Add)
            .count()
    }

    /// Returns the number of removals.
    #[must_use]
    pub fn remove_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind == OperationKind::Remove)
            .count()
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Remove => "remove",
            Self::Add => "add",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = match self.kind {
            OperationKind::Remove => '-',
            OperationKind::Add => '+',
        };
        write!(f, "{sign} {}", self.member)
    }
}

impl std::fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.tracking_id)?;
        if self.operations.is_empty() {
            return writeln!(f, "  (no changes)");
        }
        for op in &self.operations {
            writeln!(f, "  {op}")?;
        }
        Ok(())
    }
}
