//! Rollout decision module.
//!
//! This module compares live and desired workload specs and decides
//! whether the difference can be applied in place or needs a rolling
//! restart of the set's pods.

mod diff;
mod policy;
mod specialization;

pub use diff::{DiffEngine, DiffFacets, StructuralDiff, DEFAULT_GENERATION_ANNOTATION};
pub use policy::{RestartMode, RestartRules, RolloutDecision, RolloutPolicy, RolloutRule, RuleMatch};
pub use specialization::{
    GenerationStrategy, SpecializationRegistry, WorkloadSpecialization, ZOOKEEPER_KIND,
};
