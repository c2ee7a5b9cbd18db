//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ConfigHasher, ValidationResult};
use crate::planner::{OperationKind, ReconcilePlan};
use crate::state::SyncState;
use crate::sync::{EntryOutcome, EntryReport, RunSummary};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Reconciled set row for table display.
#[derive(Tabled)]
struct ApplyRow {
    #[tabled(rename = "Set")]
    set: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Removed")]
    removed: String,
    #[tabled(rename = "Added")]
    added: String,
}

/// Tracked set row for table display.
#[derive(Tabled)]
struct TrackedRow {
    #[tabled(rename = "Set")]
    set: String,
    #[tabled(rename = "Members")]
    members: usize,
    #[tabled(rename = "Mode")]
    mode: &'static str,
    #[tabled(rename = "Converged")]
    converged: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
    #[tabled(rename = "Last reconciled")]
    last_reconciled: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the plans of a run.
    #[must_use]
    pub fn format_plan(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(summary),
        }
    }

    fn format_plan_text(summary: &RunSummary) -> String {
        let plans: Vec<(&ReconcilePlan, bool)> = summary
            .reports
            .iter()
            .filter_map(|r| match &r.outcome {
                EntryOutcome::Planned { plan } if !plan.is_empty() => Some((plan, r.config_changed)),
                _ => None,
            })
            .collect();

        let mut output = String::new();

        if plans.is_empty() {
            let _ = writeln!(
                output,
                "{} No changes required - memberships are up to date.",
                "✓".green()
            );
        } else {
            output.push_str("\nMembership Plan\n\n");
            for (plan, config_changed) in &plans {
                Self::write_plan(&mut output, plan, *config_changed);
            }
            let to_add: usize = plans.iter().map(|(p, _)| p.add_count()).sum();
            let to_remove: usize = plans.iter().map(|(p, _)| p.remove_count()).sum();
            let _ = writeln!(
                output,
                "Plan: {} to add, {} to remove across {} set(s)",
                to_add.to_string().green(),
                to_remove.to_string().red(),
                plans.len()
            );
        }

        Self::write_problems(&mut output, summary);
        output
    }

    fn write_plan(output: &mut String, plan: &ReconcilePlan, config_changed: bool) {
        let id = plan.tracking_id.to_string().bold();
        if config_changed {
            let _ = writeln!(output, "  {id} {}", "(configuration changed)".yellow());
        } else {
            // Members changed out-of-band since the last apply.
            let _ = writeln!(output, "  {id} {}", "(drifted)".yellow());
        }
        for op in &plan.operations {
            let line = match op.kind {
                OperationKind::Remove => op.to_string().red(),
                OperationKind::Add => op.to_string().green(),
            };
            let _ = writeln!(output, "    {line}");
        }
        output.push('\n');
    }

    /// Formats the results of an apply run.
    #[must_use]
    pub fn format_apply(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => Self::format_apply_text(summary),
        }
    }

    fn format_apply_text(summary: &RunSummary) -> String {
        let mut output = String::new();

        if summary.reports.is_empty() {
            output.push_str("No managed memberships.\n");
            return output;
        }

        let rows: Vec<ApplyRow> = summary.reports.iter().map(Self::apply_row).collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let status = if summary.is_success() {
            format!("{} Apply complete", "✓".green())
        } else {
            format!("{} Apply finished with failures", "✗".red())
        };
        let _ = writeln!(
            output,
            "\n{status}: {} set(s), {} failed, {} drifted, {} parent(s) gone",
            summary.reports.len(),
            summary.failed_count(),
            summary.pending_count(),
            summary.parent_gone_count()
        );

        Self::write_problems(&mut output, summary);
        output
    }

    fn apply_row(report: &EntryReport) -> ApplyRow {
        let set = report.tracking_id.to_string();
        match &report.outcome {
            EntryOutcome::Reconciled { result } => ApplyRow {
                set,
                status: if result.is_converged() {
                    "converged".green().to_string()
                } else {
                    "drifted".yellow().to_string()
                },
                removed: result.removed.to_string(),
                added: result.added.to_string(),
            },
            EntryOutcome::ParentGone => ApplyRow {
                set,
                status: "parent gone".yellow().to_string(),
                removed: String::from("-"),
                added: String::from("-"),
            },
            _ => ApplyRow {
                set,
                status: "failed".red().to_string(),
                removed: String::from("-"),
                added: String::from("-"),
            },
        }
    }

    /// Formats the drift of a run.
    #[must_use]
    pub fn format_drift(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let drifted: Vec<String> = summary
                    .reports
                    .iter()
                    .filter_map(|r| match &r.outcome {
                        EntryOutcome::Drift { report } if !report.is_converged() => {
                            Some(report.to_string())
                        }
                        _ => None,
                    })
                    .collect();

                if drifted.is_empty() {
                    let _ = writeln!(output, "{} No drift detected - state is converged.", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Drift detected:\n", "⚠".yellow());
                    for line in &drifted {
                        let _ = writeln!(output, "   - {line}");
                    }
                    let _ = writeln!(
                        output,
                        "\n{}/{} set(s) have drifted.",
                        drifted.len(),
                        summary.reports.len()
                    );
                }

                Self::write_problems(&mut output, summary);
                output
            }
        }
    }

    /// Lists sets whose parent is gone or that failed.
    fn write_problems(output: &mut String, summary: &RunSummary) {
        for report in &summary.reports {
            match &report.outcome {
                EntryOutcome::ParentGone => {
                    let _ = writeln!(
                        output,
                        "{} {}: parent no longer exists, tracking cleared",
                        "⚠".yellow(),
                        report.tracking_id
                    );
                }
                EntryOutcome::Failed { error } => {
                    let _ = writeln!(output, "{} {}: {error}", "✗".red(), report.tracking_id);
                }
                _ => {}
            }
        }
    }

    /// Formats tracking state.
    #[must_use]
    pub fn format_state(&self, state: &SyncState) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let hasher = ConfigHasher::new();
                let mut output = String::new();

                let _ = writeln!(output, "\nState (version {})\n", state.version);
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Tracked sets: {}\n", state.tracked.len());

                if !state.tracked.is_empty() {
                    let rows: Vec<TrackedRow> = state
                        .tracked
                        .iter()
                        .map(|(id, set)| TrackedRow {
                            set: id.clone(),
                            members: set.members.len(),
                            mode: if set.exhaustive { "exhaustive" } else { "owned" },
                            converged: if set.converged {
                                "yes".green().to_string()
                            } else {
                                "no".yellow().to_string()
                            },
                            fingerprint: hasher.short_hash(&set.fingerprint),
                            last_reconciled: set.last_reconciled.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", state.history.len());
                    for entry in state.history.iter().rev().take(5) {
                        let status = if entry.success { "✓".green() } else { "✗".red() };
                        let _ = writeln!(
                            output,
                            "     {status} {} - {} ({} set(s)){}",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.tracking_ids.len(),
                            entry.error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
                        );
                    }
                }

                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Configuration has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a one-line status message.
    #[must_use]
    pub fn message(&self, success: bool, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let status = if success { "success" } else { "error" };
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text if success => format!("{} {message}", "✓".green()),
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{RelationKind, TrackingId};
    use crate::membership::{MemberSet, Scope};
    use crate::planner::Differencer;

    fn planned(desired: &[&str], actual: &[&str]) -> EntryReport {
        let tracking_id =
            TrackingId::new(Scope::new("acme"), RelationKind::GroupRoles, "g1").unwrap();
        let desired: MemberSet = desired.iter().copied().collect();
        let actual: MemberSet = actual.iter().copied().collect();
        let delta = Differencer::new().diff(&desired, &actual);
        EntryReport {
            tracking_id: tracking_id.clone(),
            config_changed: true,
            outcome: EntryOutcome::Planned {
                plan: ReconcilePlan::from_delta(tracking_id, &delta),
            },
        }
    }

    #[test]
    fn test_plan_text_counts() {
        colored::control::set_override(false);
        let summary = RunSummary {
            reports: vec![planned(&["a", "b"], &["c"])],
        };
        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&summary);
        assert!(text.contains("acme/group-roles/g1 (configuration changed)"));
        assert!(text.contains("- c"));
        assert!(text.contains("Plan: 2 to add, 1 to remove across 1 set(s)"));
    }

    #[test]
    fn test_plan_json_is_tagged() {
        let summary = RunSummary {
            reports: vec![planned(&["a"], &[])],
        };
        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&summary);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reports"][0]["status"], "planned");
        assert_eq!(value["reports"][0]["tracking_id"], "acme/group-roles/g1");
        assert_eq!(value["reports"][0]["config_changed"], true);
    }

    #[test]
    fn test_failed_entries_are_listed() {
        colored::control::set_override(false);
        let summary = RunSummary {
            reports: vec![EntryReport {
                tracking_id: TrackingId::decode("acme/group-roles/g2").unwrap(),
                config_changed: false,
                outcome: EntryOutcome::Failed {
                    error: String::from("boom"),
                },
            }],
        };
        let text = OutputFormatter::new(OutputFormat::Text).format_apply(&summary);
        assert!(text.contains("acme/group-roles/g2: boom"));
        assert!(text.contains("1 failed"));
    }
}
