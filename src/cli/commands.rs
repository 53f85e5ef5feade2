//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::reconciler::Trigger;
use crate::rollout::ZOOKEEPER_KIND;

/// Ensemble operator - rollout decisions and reconciliation for replicated workload sets.
#[derive(Parser, Debug)]
#[command(name = "ensemble-operator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "ENSEMBLE_OPERATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the operator configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show the rollout decision for a change between two manifests.
    Diff {
        /// Manifest of the live workload.
        #[arg(long)]
        current: PathBuf,

        /// Manifest of the desired workload.
        #[arg(long)]
        desired: PathBuf,

        /// Workload kind whose rollout rules apply.
        #[arg(short, long, default_value = ZOOKEEPER_KIND)]
        kind: String,

        /// List every changed path.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Reconcile stored workloads towards the given manifests.
    Reconcile {
        /// Desired `StatefulSet` manifests (YAML or JSON).
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Workload kind whose rollout rules apply.
        #[arg(short, long, default_value = ZOOKEEPER_KIND)]
        kind: String,

        /// What triggered this reconciliation.
        #[arg(long, default_value = "manual")]
        trigger: Trigger,

        /// Delete the named workloads instead of applying them.
        #[arg(long)]
        delete: bool,
    },

    /// List stored workloads and their generation.
    Status,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diff() {
        let cli = Cli::try_parse_from([
            "ensemble-operator",
            "diff",
            "--current",
            "live.yaml",
            "--desired",
            "zk.yaml",
            "--output",
            "json",
        ])
        .expect("valid arguments");

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Diff { current, kind, detailed, .. } => {
                assert_eq!(current, PathBuf::from("live.yaml"));
                assert_eq!(kind, ZOOKEEPER_KIND);
                assert!(!detailed);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reconcile() {
        let cli = Cli::try_parse_from([
            "ensemble-operator",
            "reconcile",
            "a.yaml",
            "b.yaml",
            "--trigger",
            "watch",
            "-v",
        ])
        .expect("valid arguments");

        assert!(cli.verbose);
        match cli.command {
            Commands::Reconcile { manifests, trigger, delete, .. } => {
                assert_eq!(manifests.len(), 2);
                assert_eq!(trigger, Trigger::Watch);
                assert!(!delete);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_requires_manifests() {
        assert!(Cli::try_parse_from(["ensemble-operator", "reconcile"]).is_err());
    }
}
