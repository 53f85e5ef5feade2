//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use k8s_openapi::api::apps::v1::StatefulSet;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::reconciler::{generation_of, PassOutcome, PassReport};
use crate::rollout::{RestartMode, RestartRules, RolloutDecision, RuleMatch, StructuralDiff};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Rollout decision for a pair of manifests.
#[derive(Debug, Clone, Serialize)]
pub struct DiffSummary {
    /// Workload kind whose rules were applied.
    pub kind: String,
    /// Restart rules of the kind.
    pub rules: RestartRules,
    /// The computed diff.
    pub diff: StructuralDiff,
    /// The rule that matched and its decision.
    pub matched: RuleMatch,
    /// Whether a reconciliation would bump the generation marker.
    pub increments_generation: bool,
}

/// A reconciliation pass that failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedPass {
    /// Resource, as `namespace/name` or the manifest path.
    pub resource: String,
    /// Error description.
    pub error: String,
}

/// Stored state of one workload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadStatus {
    /// Resource, as `namespace/name`.
    pub resource: String,
    /// Desired replica count.
    pub replicas: Option<i32>,
    /// Generation marker on the pod template.
    pub generation: u64,
    /// Resource version of the stored object.
    pub resource_version: Option<String>,
    /// Container images of the pod template.
    pub images: Vec<String>,
}

impl WorkloadStatus {
    /// Summarizes a stored object.
    #[must_use]
    pub fn from_object(object: &StatefulSet, generation_annotation: &str) -> Self {
        let namespace = object.metadata.namespace.as_deref().unwrap_or("default");
        let name = object.metadata.name.as_deref().unwrap_or("?");
        let spec = object.spec.as_ref();

        Self {
            resource: format!("{namespace}/{name}"),
            replicas: spec.and_then(|s| s.replicas),
            generation: generation_of(object, generation_annotation),
            resource_version: object.metadata.resource_version.clone(),
            images: spec
                .and_then(|s| s.template.spec.as_ref())
                .map(|pod| {
                    pod.containers
                        .iter()
                        .filter_map(|c| c.image.clone())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Pass report row for table display.
#[derive(Tabled)]
struct PassRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Generation")]
    generation: String,
    #[tabled(rename = "Attempts")]
    attempts: u32,
}

/// Workload row for table display.
#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Generation")]
    generation: u64,
    #[tabled(rename = "Version")]
    resource_version: String,
    #[tabled(rename = "Images")]
    images: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a rollout decision for display.
    #[must_use]
    pub fn format_diff(&self, summary: &DiffSummary, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Text => Self::format_diff_text(summary, detailed),
        }
    }

    fn format_diff_text(summary: &DiffSummary, detailed: bool) -> String {
        let diff = &summary.diff;
        if diff.is_empty() {
            return format!("{} No changes - live spec matches desired spec.\n", "✓".green());
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nRollout decision ({})\n", summary.kind);

        let facets = [
            ("labels", diff.labels_changed()),
            ("pod template", diff.pod_template_changed()),
            ("volume claim templates", diff.volume_claim_templates_changed()),
            ("volume size", diff.volume_size_changed()),
        ];
        for (name, changed) in facets {
            let mark = if changed { "changed".yellow() } else { "unchanged".dimmed() };
            let _ = writeln!(output, "   {name:<24} {mark}");
        }

        let _ = write!(
            output,
            "\n   Rule:       {}\n   Decision:   {}\n   Generation: {}\n",
            summary.matched.rule,
            Self::format_decision(summary.matched.decision),
            if summary.increments_generation {
                "bump".yellow().to_string()
            } else {
                "keep".green().to_string()
            }
        );

        if detailed {
            let rules = summary.rules;
            let _ = writeln!(
                output,
                "\n   Restart rules: labels {}, pod template {}, volume claim templates {}",
                Self::format_mode(rules.labels),
                Self::format_mode(rules.pod_template),
                Self::format_mode(rules.volume_claim_templates)
            );
            let _ = writeln!(output, "\n   Changed paths ({}):", diff.changed_paths().len());
            for path in diff.changed_paths() {
                let _ = writeln!(output, "     - {path}");
            }
        }

        output
    }

    /// Formats the results of reconciliation passes.
    #[must_use]
    pub fn format_reports(&self, reports: &[PassReport], failures: &[FailedPass]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "passes": reports,
                "failures": failures,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => Self::format_reports_text(reports, failures),
        }
    }

    fn format_reports_text(reports: &[PassReport], failures: &[FailedPass]) -> String {
        let status = if failures.is_empty() {
            format!("{} Reconciliation successful", "✓".green())
        } else {
            format!("{} Reconciliation failed", "✗".red())
        };

        let mut output = format!("{status}\n\n");

        if !reports.is_empty() {
            let rows: Vec<PassRow> = reports
                .iter()
                .map(|r| PassRow {
                    resource: r.resource.clone(),
                    outcome: Self::format_outcome(r.outcome),
                    generation: r.generation.map_or_else(|| String::from("-"), |g| g.to_string()),
                    attempts: r.attempts,
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let restarted = reports
            .iter()
            .filter(|r| r.outcome == PassOutcome::AppliedWithRestart)
            .count();
        let _ = write!(
            output,
            "\n{} passes, {} rolling restarts, {} failures\n",
            reports.len(),
            restarted.to_string().yellow(),
            failures.len().to_string().red()
        );

        if !failures.is_empty() {
            let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
            for failure in failures {
                let _ = writeln!(output, "   - {}: {}", failure.resource, failure.error);
            }
        }

        output
    }

    /// Formats the stored workloads.
    #[must_use]
    pub fn format_status(&self, workloads: &[WorkloadStatus]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(workloads).unwrap_or_default(),
            OutputFormat::Text => {
                if workloads.is_empty() {
                    return String::from("   No workloads stored.\n");
                }

                let rows: Vec<WorkloadRow> = workloads
                    .iter()
                    .map(|w| WorkloadRow {
                        resource: w.resource.clone(),
                        replicas: w.replicas.map_or_else(|| String::from("-"), |r| r.to_string()),
                        generation: w.generation,
                        resource_version: w.resource_version.clone().unwrap_or_default(),
                        images: Self::truncate(&w.images.join(", "), 40),
                    })
                    .collect();

                format!("\n{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());
                if show_warnings && !result.warnings.is_empty() {
                    output.push_str("\nWarnings:\n");
                    for warning in &result.warnings {
                        let _ = writeln!(output, "  {} {warning}", "⚠".yellow());
                    }
                }
                output
            }
        }
    }

    fn format_decision(decision: RolloutDecision) -> String {
        match decision {
            RolloutDecision::NoAction => decision.to_string().dimmed().to_string(),
            RolloutDecision::ApplyWithoutRestart => decision.to_string().green().to_string(),
            RolloutDecision::ApplyWithRollingRestart => decision.to_string().yellow().to_string(),
        }
    }

    const fn format_mode(mode: RestartMode) -> &'static str {
        match mode {
            RestartMode::RollingRestart => "rolling restart",
            RestartMode::InPlace => "in place",
        }
    }

    fn format_outcome(outcome: PassOutcome) -> String {
        match outcome {
            PassOutcome::NoAction => "unchanged".dimmed().to_string(),
            PassOutcome::AppliedNoRestart => "~applied".green().to_string(),
            PassOutcome::AppliedWithRestart => "~restart".yellow().to_string(),
            PassOutcome::Created => "+created".green().to_string(),
            PassOutcome::Deleted => "-deleted".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
