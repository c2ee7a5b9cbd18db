//! Plan executor for applying reconciliation plans.
//!
//! Operations run strictly one after another. The first failure stops the
//! run and everything not yet applied is reported back, so the caller can
//! re-run reconciliation and pick up exactly the outstanding difference.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{ApplyPhase, KcSyncError, ReconcileError, Result};
use crate::membership::{ParentRef, RemoteSetClient};

use super::plan::{OperationKind, PlannedOperation, ReconcilePlan};

/// Executor for reconciliation plans.
#[derive(Debug)]
pub struct PlanExecutor<'a, C: RemoteSetClient + ?Sized> {
    /// Remote set the plan is applied to.
    client: &'a C,
}

/// Result of executing a plan to completion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    /// Members removed.
    pub removed: usize,
    /// Members added.
    pub added: usize,
}

impl<'a, C: RemoteSetClient + ?Sized> PlanExecutor<'a, C> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Executes a plan against a parent.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::PartialApply`] carrying every operation not
    /// applied, starting with the one that failed.
    pub async fn execute(&self, plan: &ReconcilePlan, parent: &ParentRef) -> Result<ExecutionResult> {
        if plan.is_empty() {
            debug!("Nothing to apply for {}", plan.tracking_id);
            return Ok(ExecutionResult::default());
        }

        info!(
            "Applying {} removal(s) and {} addition(s) to {}",
            plan.remove_count(),
            plan.add_count(),
            plan.tracking_id
        );

        let mut result = ExecutionResult::default();

        for (idx, op) in plan.operations.iter().enumerate() {
            if let Err(e) = self.execute_operation(op, parent).await {
                error!("Failed to {} {} on {}: {}", op.kind, op.member, plan.tracking_id, e);
                return Err(Self::partial_failure(&plan.operations[idx..], e));
            }

            match op.kind {
                OperationKind::Remove => result.removed += 1,
                OperationKind::Add => result.added += 1,
            }
        }

        Ok(result)
    }

    /// Executes a single operation.
    async fn execute_operation(&self, op: &PlannedOperation, parent: &ParentRef) -> Result<()> {
        debug!("{} {} on {}", op.kind, op.member, parent);
        match op.kind {
            OperationKind::Remove => self.client.remove(parent, &op.member).await,
            OperationKind::Add => self.client.add(parent, &op.member).await,
        }
    }

    fn partial_failure(not_applied: &[PlannedOperation], source: KcSyncError) -> KcSyncError {
        let failed = &not_applied[0];
        KcSyncError::Reconcile(ReconcileError::PartialApply {
            phase: phase_of(failed.kind),
            failed_member: failed.member.clone(),
            remaining: not_applied
                .iter()
                .map(|op| (phase_of(op.kind), op.member.clone()))
                .collect(),
            source: Box::new(source),
        })
    }
}

const fn phase_of(kind: OperationKind) -> ApplyPhase {
    match kind {
        OperationKind::Remove => ApplyPhase::Remove,
        OperationKind::Add => ApplyPhase::Add,
    }
}
