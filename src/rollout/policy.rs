//! Rollout decision policy.
//!
//! Maps a [`StructuralDiff`] to a [`RolloutDecision`] through an ordered,
//! first-match-wins rule set. Evaluation is pure; [`RolloutPolicy::decide`]
//! additionally reports the matched rule in the pass's span.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconciler::ReconciliationContext;

use super::diff::StructuralDiff;

/// What to do with a workload after comparing live and desired specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutDecision {
    /// Nothing requires a restart and no modeled facet changed.
    NoAction,
    /// Apply the new spec; running pods keep going.
    ApplyWithoutRestart,
    /// Apply the new spec and replace pods one by one.
    ApplyWithRollingRestart,
}

/// The rule that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutRule {
    /// Nothing changed.
    EmptyDiff,
    /// The set's labels changed.
    Labels,
    /// The pod template changed.
    PodTemplate,
    /// The volume claim templates changed structurally.
    VolumeClaimTemplates,
    /// Only the storage size of a claim template changed.
    VolumeSize,
    /// Only fields outside the modeled facets changed.
    Unmodeled,
}

/// A matched rule together with its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuleMatch {
    /// The rule that matched.
    pub rule: RolloutRule,
    /// The decision it produced.
    pub decision: RolloutDecision,
}

/// How a change to one facet is rolled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Pods must be replaced for the change to take effect.
    #[default]
    RollingRestart,
    /// The change is safe to apply without touching pods.
    InPlace,
}

/// Per-facet restart requirements of a workload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartRules {
    /// Label changes.
    pub labels: RestartMode,
    /// Pod template changes.
    pub pod_template: RestartMode,
    /// Structural volume claim template changes.
    pub volume_claim_templates: RestartMode,
}

/// Ordered rule set classifying structural diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RolloutPolicy {
    rules: RestartRules,
}

impl RolloutPolicy {
    /// Creates a policy from per-facet restart rules.
    #[must_use]
    pub const fn new(rules: RestartRules) -> Self {
        Self { rules }
    }

    /// The conservative policy for quorum ensembles: every structural
    /// change restarts, storage growth is applied in place.
    #[must_use]
    pub const fn ensemble() -> Self {
        Self::new(RestartRules {
            labels: RestartMode::RollingRestart,
            pod_template: RestartMode::RollingRestart,
            volume_claim_templates: RestartMode::RollingRestart,
        })
    }

    /// Returns the restart rules of this policy.
    #[must_use]
    pub const fn rules(&self) -> RestartRules {
        self.rules
    }

    /// Evaluates the rule set against a diff.
    #[must_use]
    pub fn evaluate(&self, diff: &StructuralDiff) -> RuleMatch {
        if diff.is_empty() {
            return RuleMatch::new(RolloutRule::EmptyDiff, RolloutDecision::NoAction);
        }

        let facets = [
            (RolloutRule::Labels, diff.labels_changed(), self.rules.labels),
            (
                RolloutRule::PodTemplate,
                diff.pod_template_changed(),
                self.rules.pod_template,
            ),
            (
                RolloutRule::VolumeClaimTemplates,
                diff.volume_claim_templates_changed(),
                self.rules.volume_claim_templates,
            ),
        ];

        if let Some((rule, ..)) = facets
            .iter()
            .find(|(_, changed, mode)| *changed && *mode == RestartMode::RollingRestart)
        {
            return RuleMatch::new(*rule, RolloutDecision::ApplyWithRollingRestart);
        }

        // Changed facets whose kind allows in-place application.
        if let Some((rule, ..)) = facets.iter().find(|(_, changed, _)| *changed) {
            return RuleMatch::new(*rule, RolloutDecision::ApplyWithoutRestart);
        }

        if diff.volume_size_changed() {
            return RuleMatch::new(RolloutRule::VolumeSize, RolloutDecision::ApplyWithoutRestart);
        }

        RuleMatch::new(RolloutRule::Unmodeled, RolloutDecision::NoAction)
    }

    /// Decides how to roll out a diff and records the matched rule.
    #[must_use]
    pub fn decide(&self, ctx: &ReconciliationContext, diff: &StructuralDiff) -> RolloutDecision {
        let matched = self.evaluate(diff);
        debug!(
            parent: ctx.span(),
            rule = %matched.rule,
            decision = %matched.decision,
            "{}: {}",
            ctx,
            matched.rule.description()
        );
        matched.decision
    }

    /// Returns true if the diff requires a rolling restart.
    #[must_use]
    pub fn needs_rolling_update(&self, ctx: &ReconciliationContext, diff: &StructuralDiff) -> bool {
        self.decide(ctx, diff) == RolloutDecision::ApplyWithRollingRestart
    }
}

impl RuleMatch {
    /// Creates a rule match.
    #[must_use]
    pub const fn new(rule: RolloutRule, decision: RolloutDecision) -> Self {
        Self { rule, decision }
    }
}

impl RolloutRule {
    /// Human-readable description of what the rule observed.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::EmptyDiff => "no changes between live and desired spec",
            Self::Labels => "labels changed",
            Self::PodTemplate => "pod template changed",
            Self::VolumeClaimTemplates => "volume claim templates changed",
            Self::VolumeSize => "volume claim storage size changed",
            Self::Unmodeled => "only fields outside the rollout facets changed",
        }
    }
}

impl std::fmt::Display for RolloutDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoAction => "no action",
            Self::ApplyWithoutRestart => "apply without restart",
            Self::ApplyWithRollingRestart => "apply with rolling restart",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for RolloutRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EmptyDiff => "empty-diff",
            Self::Labels => "labels",
            Self::PodTemplate => "pod-template",
            Self::VolumeClaimTemplates => "volume-claim-templates",
            Self::VolumeSize => "volume-size",
            Self::Unmodeled => "unmodeled",
        };
        write!(f, "{s}")
    }
}
