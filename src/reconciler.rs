//! Reconciler for membership sets.
//!
//! This module implements the fetch → diff → remove → add → re-read sequence
//! that converges one remote membership set onto its desired state. It holds
//! no lock on the remote set: every run recomputes its delta from a fresh
//! read, which makes re-running after any failure safe.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{KcSyncError, ReconcileError, Result};
use crate::identity::TrackingId;
use crate::membership::{MemberSet, RemoteSetClient};
use crate::planner::{Delta, Differencer, PlanExecutor, ReconcilePlan};

/// Which actual members a run is allowed to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Every member not desired is removed.
    #[default]
    Exhaustive,
    /// Only members previously applied by this tool (and no longer desired)
    /// are removed.
    Owned(MemberSet),
}

/// Reconciler for one relation kind.
#[derive(Debug)]
pub struct Reconciler<C: RemoteSetClient> {
    /// Remote set client.
    client: C,
    /// Differencer.
    differencer: Differencer,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    /// The reconciled set.
    pub tracking_id: TrackingId,
    /// Delta computed against the first read.
    pub delta: Delta,
    /// Number of members removed.
    pub removed: usize,
    /// Number of members added.
    pub added: usize,
    /// Membership read back after applying.
    pub final_actual: MemberSet,
    /// Difference still outstanding after the re-read.
    pub residual: Delta,
}

/// Report of drift detection.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    /// The checked set.
    pub tracking_id: TrackingId,
    /// Membership currently on the server.
    pub actual: MemberSet,
    /// Changes a reconciliation would make.
    pub drift: Delta,
}

impl<C: RemoteSetClient> Reconciler<C> {
    /// Creates a new reconciler over a remote set client.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self {
            client,
            differencer: Differencer::new(),
        }
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Reads the actual membership of a tracked set.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ParentGone`] if the parent no longer exists,
    /// or the client's error otherwise.
    pub async fn read(&self, tracking_id: &TrackingId) -> Result<MemberSet> {
        let parent = tracking_id.parent();
        self.client.fetch(&parent).await.map_err(|e| {
            if e.is_not_found() {
                warn!("Parent of {tracking_id} no longer exists: {e}");
                KcSyncError::Reconcile(ReconcileError::ParentGone {
                    tracking_id: tracking_id.to_string(),
                })
            } else {
                e
            }
        })
    }

    /// Computes the plan a reconciliation would apply, without applying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the actual membership cannot be read.
    pub async fn plan(
        &self,
        tracking_id: &TrackingId,
        desired: &MemberSet,
        policy: &RemovalPolicy,
    ) -> Result<ReconcilePlan> {
        let actual = self.read(tracking_id).await?;
        let delta = self.compute_delta(desired, &actual, policy);
        Ok(ReconcilePlan::from_delta(tracking_id.clone(), &delta))
    }

    /// Converges a remote membership set onto `desired`.
    ///
    /// Removals are applied before additions. The first failing operation
    /// aborts the run; no retries happen here.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ParentGone`] if the parent disappeared,
    /// [`ReconcileError::PartialApply`] if an operation failed, or the
    /// client's error if a read failed.
    pub async fn reconcile(
        &self,
        tracking_id: &TrackingId,
        desired: &MemberSet,
        policy: &RemovalPolicy,
    ) -> Result<ReconciliationResult> {
        info!("Reconciling {tracking_id}");

        let actual = self.read(tracking_id).await?;
        debug!("Actual membership of {tracking_id}: {actual}");

        let delta = self.compute_delta(desired, &actual, policy);
        let plan = ReconcilePlan::from_delta(tracking_id.clone(), &delta);

        let execution = PlanExecutor::new(&self.client)
            .execute(&plan, &tracking_id.parent())
            .await?;

        let final_actual = self.read(tracking_id).await?;
        let residual = self.compute_delta(desired, &final_actual, policy);

        if residual.is_empty() {
            info!(
                "Reconciled {tracking_id}: {} added, {} removed",
                execution.added, execution.removed
            );
        } else {
            warn!("{tracking_id} drifted while reconciling, outstanding: {residual}");
        }

        Ok(ReconciliationResult {
            tracking_id: tracking_id.clone(),
            delta,
            removed: execution.removed,
            added: execution.added,
            final_actual,
            residual,
        })
    }

    /// Checks for drift without applying changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the actual membership cannot be read.
    pub async fn check_drift(
        &self,
        tracking_id: &TrackingId,
        desired: &MemberSet,
        policy: &RemovalPolicy,
    ) -> Result<DriftReport> {
        let actual = self.read(tracking_id).await?;
        let drift = self.compute_delta(desired, &actual, policy);
        Ok(DriftReport {
            tracking_id: tracking_id.clone(),
            actual,
            drift,
        })
    }

    fn compute_delta(&self, desired: &MemberSet, actual: &MemberSet, policy: &RemovalPolicy) -> Delta {
        match policy {
            RemovalPolicy::Exhaustive => self.differencer.diff(desired, actual),
            RemovalPolicy::Owned(owned) => self.differencer.diff_owned(desired, actual, owned),
        }
    }
}

impl ReconciliationResult {
    /// Returns true if the re-read matched the desired state.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.residual.is_empty()
    }
}

impl DriftReport {
    /// Returns true if the state is converged (no drift).
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.drift.is_empty()
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_converged() {
            write!(f, "{}: no drift", self.tracking_id)
        } else {
            write!(f, "{}: {}", self.tracking_id, self.drift)
        }
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_converged() { "converged" } else { "drifted" };
        writeln!(f, "{} {status}:", self.tracking_id)?;
        writeln!(f, "  Added: {}", self.added)?;
        writeln!(f, "  Removed: {}", self.removed)?;
        writeln!(f, "  Members: {}", self.final_actual)?;
        if !self.is_converged() {
            writeln!(f, "  Outstanding: {}", self.residual)?;
        }
        Ok(())
    }
}
