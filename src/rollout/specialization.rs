//! Per-kind binding of rollout policies into the reconciler's seam.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ReconcileError, Result};
use crate::reconciler::ReconciliationContext;

use super::diff::StructuralDiff;
use super::policy::{RestartRules, RolloutPolicy};

/// Workload kind of the coordination ensemble.
pub const ZOOKEEPER_KIND: &str = "zookeeper";

/// Decides whether a pass must bump the generation marker.
///
/// This is the single extension point of [`crate::reconciler::SetReconciler`].
/// Plain closures implement it too.
pub trait GenerationStrategy: Send + Sync {
    /// Returns true if applying `diff` must trigger pod replacement.
    fn should_increment_generation(&self, ctx: &ReconciliationContext, diff: &StructuralDiff) -> bool;
}

impl<F> GenerationStrategy for F
where
    F: Fn(&ReconciliationContext, &StructuralDiff) -> bool + Send + Sync,
{
    fn should_increment_generation(&self, ctx: &ReconciliationContext, diff: &StructuralDiff) -> bool {
        self(ctx, diff)
    }
}

/// A workload kind with its rollout policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpecialization {
    kind: String,
    policy: RolloutPolicy,
}

impl WorkloadSpecialization {
    /// Creates a specialization for a kind.
    #[must_use]
    pub fn new(kind: impl Into<String>, policy: RolloutPolicy) -> Self {
        Self {
            kind: kind.into(),
            policy,
        }
    }

    /// The built-in ensemble specialization.
    #[must_use]
    pub fn zookeeper() -> Self {
        Self::new(ZOOKEEPER_KIND, RolloutPolicy::ensemble())
    }

    /// Workload kind name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Policy bound to this kind.
    #[must_use]
    pub const fn policy(&self) -> &RolloutPolicy {
        &self.policy
    }
}

impl GenerationStrategy for WorkloadSpecialization {
    fn should_increment_generation(&self, ctx: &ReconciliationContext, diff: &StructuralDiff) -> bool {
        !diff.is_empty() && self.policy.needs_rolling_update(ctx, diff)
    }
}

/// Registry of specializations by workload kind.
#[derive(Debug, Clone)]
pub struct SpecializationRegistry {
    kinds: BTreeMap<String, Arc<WorkloadSpecialization>>,
}

impl SpecializationRegistry {
    /// Creates a registry holding the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            kinds: BTreeMap::new(),
        };
        registry.register(WorkloadSpecialization::zookeeper());
        registry
    }

    /// Creates a registry from configured restart rules.
    ///
    /// Configured kinds replace built-in ones of the same name.
    #[must_use]
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = (&'a String, &'a RestartRules)>) -> Self {
        let mut registry = Self::new();
        for (kind, rules) in rules {
            registry.register(WorkloadSpecialization::new(kind.clone(), RolloutPolicy::new(*rules)));
        }
        registry
    }

    /// Registers a specialization, replacing any previous one for its kind.
    pub fn register(&mut self, specialization: WorkloadSpecialization) {
        self.kinds
            .insert(specialization.kind.clone(), Arc::new(specialization));
    }

    /// Looks up the specialization for a kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is not registered.
    pub fn get(&self, kind: &str) -> Result<Arc<WorkloadSpecialization>> {
        self.kinds.get(kind).cloned().ok_or_else(|| {
            ReconcileError::UnknownKind {
                kind: kind.to_string(),
            }
            .into()
        })
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl Default for SpecializationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
