// ============================================================================
// Strict linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![warn(dead_code)]
#![warn(unused_imports)]
#![warn(unused_variables)]

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # kcsync
//!
//! Declarative, idempotent reconciliation of Keycloak membership sets.
//!
//! ## Overview
//!
//! A membership set is the collection of children attached to one parent:
//! the users of a group, the default scopes of a client, the composites of a
//! role. kcsync converges each configured set onto its desired members with
//! per-member add and remove calls, so concurrent edits by other tools are
//! tolerated and an interrupted run can always be repeated.
//!
//! ## Architecture
//!
//! 1. **Desired set**: listed in `kcsync.yaml`
//! 2. **Actual set**: read through a [`RemoteSetClient`]
//! 3. **Reconciler**: diffs the two, removes, adds, then re-reads
//!
//! ## Modules
//!
//! - [`membership`]: set value types and the remote client contract
//! - [`identity`]: tracking identifiers for reconciled sets
//! - [`planner`]: set difference, ordered plans and plan execution
//! - [`reconciler`]: the per-set reconciliation engine
//! - [`conflict`]: name disambiguation on create conflicts
//! - [`keycloak`]: admin API transport and one adapter per relation kind
//! - [`config`]: configuration parsing and validation
//! - [`state`]: local tracking state
//! - [`sync`]: concurrent reconciliation of many sets
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```yaml
//! keycloak:
//!   url: https://sso.example.com
//!
//! memberships:
//!   - realm: acme
//!     kind: group-memberships
//!     parent: 1c9b4c1e-2f5d-4e0a-9d5a-0b8e6f0c7a11
//!     members: [alice, bob]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod conflict;
pub mod error;
pub mod identity;
pub mod keycloak;
pub mod membership;
pub mod planner;
pub mod reconciler;
pub mod state;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, SyncConfig};
pub use conflict::ConflictResolver;
pub use error::{KcSyncError, Result};
pub use identity::{MemberTrackingId, RelationKind, TrackingId};
pub use keycloak::KeycloakClient;
pub use membership::{MemberId, MemberSet, ParentRef, RemoteSetClient, Scope};
pub use planner::{Delta, Differencer, PlanExecutor, ReconcilePlan};
pub use reconciler::{DriftReport, ReconciliationResult, Reconciler, RemovalPolicy};
pub use state::{LocalStateStore, StateStore, SyncState};
pub use sync::{ManagedEntry, RunSummary, SyncRunner};
