//! Correlation data threaded through a reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::store::WorkloadKey;

/// Why a reconciliation pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// A watch event on the resource.
    Watch,
    /// The periodic resync timer.
    Timer,
    /// An explicit request from an operator or the CLI.
    #[default]
    Manual,
}

/// Identity and logging span of one reconciliation pass.
///
/// The span carries the correlation fields; anything that logs on behalf of
/// the pass does so inside it. Nothing downstream mutates the context.
#[derive(Debug, Clone)]
pub struct ReconciliationContext {
    id: Uuid,
    kind: String,
    key: WorkloadKey,
    trigger: Trigger,
    started_at: DateTime<Utc>,
    span: Span,
}

impl ReconciliationContext {
    /// Starts a new reconciliation context for a workload.
    #[must_use]
    pub fn new(kind: impl Into<String>, key: WorkloadKey, trigger: Trigger) -> Self {
        let id = Uuid::new_v4();
        let kind = kind.into();
        let span = info_span!(
            "reconciliation",
            id = %id,
            kind = %kind,
            namespace = %key.namespace,
            name = %key.name,
            trigger = %trigger,
        );

        Self {
            id,
            kind,
            key,
            trigger,
            started_at: Utc::now(),
            span,
        }
    }

    /// Unique identifier of this pass.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Workload kind being reconciled.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Key of the workload being reconciled.
    #[must_use]
    pub const fn key(&self) -> &WorkloadKey {
        &self.key
    }

    /// What started this pass.
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// When this pass started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Span that log events for this pass belong to.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Watch => "watch",
            Self::Timer => "timer",
            Self::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ReconciliationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id.simple().to_string();
        write!(
            f,
            "Reconciliation #{}({}) {}({})",
            &id[..8],
            self.trigger,
            self.kind,
            self.key
        )
    }
}
