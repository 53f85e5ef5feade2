//! CLI module for the ensemble operator.
//!
//! This module provides the command-line interface for inspecting rollout
//! decisions and reconciling workloads against the local store.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::{DiffSummary, FailedPass, OutputFormatter, WorkloadStatus};
