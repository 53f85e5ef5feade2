// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Ensemble Set Operator
//!
//! Rollout decisions and reconciliation for replicated, quorum-based
//! workloads (`ZooKeeper`-style ensembles) running as `StatefulSet`s.
//!
//! ## Overview
//!
//! Rolling a quorum ensemble is disruptive: every pod restart costs a leader
//! election. The operator only restarts pods when the change requires it:
//!
//! - Label, pod template and volume claim template changes trigger a rolling restart
//! - Storage size growth is applied in place
//! - Anything else is written without touching pods
//!
//! ## Architecture
//!
//! 1. **Diff**: [`rollout::DiffEngine`] compares the live and desired objects
//! 2. **Decide**: [`rollout::RolloutPolicy`] maps the diff to a decision
//! 3. **Reconcile**: [`reconciler::SetReconciler`] writes the desired spec and
//!    bumps the pod template's generation marker when a restart is needed
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`rollout`]: Structural diff, rollout policy and per-kind specializations
//! - [`reconciler`]: Generic reconciliation driver
//! - [`store`]: Workload API seam with in-memory and local file backends
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! operator:
//!   namespace: kafka
//!   generation_annotation: ensemble.io/generation
//!
//! workloads:
//!   etcd:
//!     labels: in_place
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod rollout;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, OperatorConfig};
pub use error::{OperatorError, Result};
pub use reconciler::{PassOutcome, PassReport, ReconciliationContext, SetReconciler, Trigger};
pub use rollout::{
    DiffEngine, GenerationStrategy, RolloutDecision, RolloutPolicy, StructuralDiff,
    WorkloadSpecialization,
};
pub use store::{InMemoryWorkloadApi, LocalWorkloadStore, WorkloadApi, WorkloadKey};
