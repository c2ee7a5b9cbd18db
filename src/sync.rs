//! Batch reconciliation of every configured membership set.
//!
//! Each set is reconciled by its own [`Reconciler`], strictly sequentially.
//! Distinct sets run concurrently, bounded by the configured parallelism.
//! A failing set never stops the others; its outcome is reported and its
//! tracking record is left as it was.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigHasher, SyncConfig};
use crate::error::{KcSyncError, RemoteError, Result};
use crate::identity::{MemberTrackingId, RelationKind, TrackingId};
use crate::keycloak::{KeycloakClient, set_client_for};
use crate::membership::{MemberSet, RemoteSetClient};
use crate::planner::ReconcilePlan;
use crate::reconciler::{DriftReport, ReconciliationResult, Reconciler, RemovalPolicy};
use crate::state::{HistoryEntry, SyncOperation, SyncState, TrackedSet};

/// Builds the remote client for a relation kind.
pub type ClientFactory = Arc<dyn Fn(RelationKind) -> Arc<dyn RemoteSetClient> + Send + Sync>;

type SetReconciler = Reconciler<Arc<dyn RemoteSetClient>>;

/// A configured set with members to converge on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEntry {
    /// The set.
    pub tracking_id: TrackingId,
    /// Desired members.
    pub desired: MemberSet,
    /// Whether members kcsync never added are removed.
    pub exhaustive: bool,
}

/// What happened to one set during a run.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Changes `apply` would make.
    Planned {
        /// The plan.
        plan: ReconcilePlan,
    },
    /// The set was reconciled.
    Reconciled {
        /// The result.
        result: ReconciliationResult,
    },
    /// The set was compared without changes.
    Drift {
        /// The report.
        report: DriftReport,
    },
    /// The parent no longer exists; tracking is cleared.
    ParentGone,
    /// The set could not be read or converged.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Outcome of one set.
#[derive(Debug, Serialize)]
pub struct EntryReport {
    /// The set.
    pub tracking_id: TrackingId,
    /// Whether the configured members or mode differ from the last apply.
    pub config_changed: bool,
    /// What happened.
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Outcomes of a run, in configuration order.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Per-set outcomes.
    pub reports: Vec<EntryReport>,
}

/// Runs reconciliations for many sets.
#[derive(Clone)]
pub struct SyncRunner {
    factory: ClientFactory,
    parallelism: usize,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Plan,
    Apply,
    Drift,
}

impl ManagedEntry {
    /// Collects the entries of a configuration that list members.
    ///
    /// Entries without a `members` key are not managed and are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry's tracking identifier cannot be encoded.
    pub fn from_config(config: &SyncConfig) -> Result<Vec<Self>> {
        let mut entries = Vec::with_capacity(config.memberships.len());
        for entry in &config.memberships {
            let tracking_id = entry.tracking_id()?;
            let Some(desired) = entry.desired() else {
                debug!("Skipping {tracking_id}: no members configured");
                continue;
            };
            entries.push(Self {
                tracking_id,
                desired,
                exhaustive: entry.exhaustive,
            });
        }
        Ok(entries)
    }

    /// Returns the removal policy for this entry given what was last applied.
    #[must_use]
    pub fn policy(&self, state: &SyncState) -> RemovalPolicy {
        if self.exhaustive {
            RemovalPolicy::Exhaustive
        } else {
            RemovalPolicy::Owned(state.owned(&self.tracking_id))
        }
    }

    /// Returns true if the desired members or mode differ from what the last
    /// apply recorded, or if the set was never applied.
    #[must_use]
    pub fn changed_since_apply(&self, state: &SyncState) -> bool {
        state.get(&self.tracking_id).is_none_or(|tracked| {
            tracked.exhaustive != self.exhaustive
                || tracked.fingerprint != ConfigHasher::new().fingerprint(&self.desired)
        })
    }
}

impl RunSummary {
    /// Returns the number of sets that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::Failed { .. }))
            .count()
    }

    /// Returns the number of sets whose parent disappeared.
    #[must_use]
    pub fn parent_gone_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, EntryOutcome::ParentGone))
            .count()
    }

    /// Returns the number of sets that are not (or would not be) converged.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| match &r.outcome {
                EntryOutcome::Planned { plan } => !plan.is_empty(),
                EntryOutcome::Reconciled { result } => !result.is_converged(),
                EntryOutcome::Drift { report } => !report.is_converged(),
                EntryOutcome::ParentGone | EntryOutcome::Failed { .. } => false,
            })
            .count()
    }

    /// Returns true if no set failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

impl SyncRunner {
    /// Creates a runner over arbitrary remote clients.
    #[must_use]
    pub fn new(factory: ClientFactory, parallelism: usize) -> Self {
        Self {
            factory,
            parallelism: parallelism.max(1),
        }
    }

    /// Creates a runner over the Keycloak adapters.
    #[must_use]
    pub fn keycloak(client: Arc<KeycloakClient>, parallelism: usize) -> Self {
        let factory: ClientFactory = Arc::new(move |kind| set_client_for(kind, Arc::clone(&client)));
        Self::new(factory, parallelism)
    }

    fn reconciler(&self, kind: RelationKind) -> SetReconciler {
        Reconciler::new((self.factory)(kind))
    }

    /// Computes the plan of every entry.
    ///
    /// # Errors
    ///
    /// Returns an error only if a worker task panicked.
    pub async fn plan(&self, entries: &[ManagedEntry], state: &SyncState) -> Result<RunSummary> {
        self.run(Mode::Plan, entries, state).await
    }

    /// Compares every entry with the remote state.
    ///
    /// # Errors
    ///
    /// Returns an error only if a worker task panicked.
    pub async fn drift(&self, entries: &[ManagedEntry], state: &SyncState) -> Result<RunSummary> {
        self.run(Mode::Drift, entries, state).await
    }

    /// Reconciles every entry and records the outcome in `state`.
    ///
    /// Converged or drifted sets are recorded with their desired members.
    /// Sets whose parent is gone are forgotten. Failed exhaustive sets keep
    /// their previous record. A failed non-exhaustive set may have gained
    /// some desired members before the failure, so it records the union of
    /// what it owned and what it wanted, keeping the previous fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error only if a worker task panicked.
    pub async fn apply(&self, entries: &[ManagedEntry], state: &mut SyncState) -> Result<RunSummary> {
        let summary = self.run(Mode::Apply, entries, state).await?;

        for (entry, report) in entries.iter().zip(&summary.reports) {
            match &report.outcome {
                EntryOutcome::Reconciled { result } => {
                    let fingerprint = ConfigHasher::new().fingerprint(&entry.desired);
                    state.track(
                        &entry.tracking_id,
                        TrackedSet::new(
                            entry.desired.clone(),
                            fingerprint,
                            entry.exhaustive,
                            result.is_converged(),
                        ),
                    );
                }
                EntryOutcome::ParentGone => {
                    state.forget(&entry.tracking_id);
                }
                EntryOutcome::Failed { .. } if !entry.exhaustive => {
                    let owned = state.owned(&entry.tracking_id).union(&entry.desired);
                    let fingerprint = state
                        .get(&entry.tracking_id)
                        .map(|t| t.fingerprint.clone())
                        .unwrap_or_default();
                    state.track(
                        &entry.tracking_id,
                        TrackedSet::new(owned, fingerprint, false, false),
                    );
                }
                _ => {}
            }
        }

        if !summary.reports.is_empty() {
            let ids = summary.reports.iter().map(|r| r.tracking_id.encode()).collect();
            let history = if summary.is_success() {
                HistoryEntry::new(SyncOperation::Apply, ids)
            } else {
                HistoryEntry::failed(
                    SyncOperation::Apply,
                    ids,
                    &format!("{} set(s) failed", summary.failed_count()),
                )
            };
            state.add_history(history);
        }

        Ok(summary)
    }

    /// Adopts a whole set: its current members become the managed set.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ParentGone`](crate::error::ReconcileError::ParentGone)
    /// if the parent does not exist, after forgetting any previous record.
    pub async fn import(
        &self,
        tracking_id: &TrackingId,
        exhaustive: bool,
        state: &mut SyncState,
    ) -> Result<MemberSet> {
        let reconciler = self.reconciler(tracking_id.kind);
        let actual = match reconciler.read(tracking_id).await {
            Ok(actual) => actual,
            Err(e) => {
                if e.is_parent_gone() {
                    state.forget(tracking_id);
                }
                return Err(e);
            }
        };

        info!("Imported {tracking_id} with {} member(s)", actual.len());
        let fingerprint = ConfigHasher::new().fingerprint(&actual);
        state.track(
            tracking_id,
            TrackedSet::new(actual.clone(), fingerprint, exhaustive, true),
        );
        state.add_history(HistoryEntry::new(
            SyncOperation::Import,
            vec![tracking_id.encode()],
        ));
        Ok(actual)
    }

    /// Adopts one grant: the member joins the set's managed members.
    ///
    /// A set imported this way for the first time is non-exhaustive.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is not attached, or `ParentGone` after
    /// forgetting the set's record.
    pub async fn import_member(&self, id: &MemberTrackingId, state: &mut SyncState) -> Result<()> {
        let reconciler = self.reconciler(id.set.kind);
        let actual = match reconciler.read(&id.set).await {
            Ok(actual) => actual,
            Err(e) => {
                if e.is_parent_gone() {
                    state.forget(&id.set);
                }
                return Err(e);
            }
        };
        if !actual.contains(&id.member) {
            return Err(KcSyncError::Remote(RemoteError::NotFound {
                resource: format!("{} '{}' in {}", id.set.kind.member_label(), id.member, id.set),
            }));
        }

        let exhaustive = state.get(&id.set).is_some_and(|t| t.exhaustive);
        let owned: MemberSet = std::iter::once(id.member.clone()).collect();
        let owned = state.owned(&id.set).union(&owned);
        let fingerprint = ConfigHasher::new().fingerprint(&owned);

        info!("Imported {id}");
        state.track(&id.set, TrackedSet::new(owned, fingerprint, exhaustive, true));
        state.add_history(HistoryEntry::new(SyncOperation::Import, vec![id.to_string()]));
        Ok(())
    }

    async fn run(&self, mode: Mode, entries: &[ManagedEntry], state: &SyncState) -> Result<RunSummary> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut join_set = JoinSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let reconciler = self.reconciler(entry.tracking_id.kind);
            let policy = entry.policy(state);
            let config_changed = entry.changed_since_apply(state);
            let entry = entry.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_entry(mode, &reconciler, &entry, &policy).await,
                    Err(e) => EntryOutcome::Failed {
                        error: e.to_string(),
                    },
                };
                (
                    index,
                    EntryReport {
                        tracking_id: entry.tracking_id,
                        config_changed,
                        outcome,
                    },
                )
            });
        }

        let mut slots: Vec<Option<EntryReport>> = entries.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, report) = joined
                .map_err(|e| KcSyncError::internal(format!("Reconciliation task failed: {e}")))?;
            slots[index] = Some(report);
        }

        Ok(RunSummary {
            reports: slots.into_iter().flatten().collect(),
        })
    }
}

impl std::fmt::Debug for SyncRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRunner")
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

async fn run_entry(
    mode: Mode,
    reconciler: &SetReconciler,
    entry: &ManagedEntry,
    policy: &RemovalPolicy,
) -> EntryOutcome {
    let id = &entry.tracking_id;
    let desired = &entry.desired;

    let outcome = match mode {
        Mode::Plan => reconciler
            .plan(id, desired, policy)
            .await
            .map(|plan| EntryOutcome::Planned { plan }),
        Mode::Apply => reconciler
            .reconcile(id, desired, policy)
            .await
            .map(|result| EntryOutcome::Reconciled { result }),
        Mode::Drift => reconciler
            .check_drift(id, desired, policy)
            .await
            .map(|report| EntryOutcome::Drift { report }),
    };

    outcome.unwrap_or_else(|e| {
        if e.is_parent_gone() {
            warn!("Parent of {id} is gone, clearing its tracking");
            EntryOutcome::ParentGone
        } else {
            error!("{id}: {e}");
            EntryOutcome::Failed {
                error: e.to_string(),
            }
        }
    })
}
