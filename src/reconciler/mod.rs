//! Reconciliation engine.
//!
//! A pass compares the live workload with the desired one, decides through a
//! [`GenerationStrategy`](crate::rollout::GenerationStrategy) whether pods must
//! be replaced, and writes the result in one update.

mod context;
mod locks;
mod set;

pub use context::{ReconciliationContext, Trigger};
pub use locks::KeyedLocks;
pub use set::{generation_of, PassOutcome, PassReport, ReconcileSettings, SetReconciler};
