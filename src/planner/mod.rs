//! Planning module for membership reconciliation.
//!
//! This module computes the difference between desired and actual
//! membership, orders it into a plan, and applies that plan one member at a
//! time.

mod diff;
mod plan;
mod executor;

pub use diff::{Delta, Differencer};
pub use plan::{OperationKind, PlannedOperation, ReconcilePlan};
pub use executor::{ExecutionResult, PlanExecutor};
