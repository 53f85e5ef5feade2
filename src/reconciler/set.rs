//! Generic reconciliation driver for workload sets.
//!
//! One pass fetches the live object, diffs it against the desired one, asks
//! the injected [`GenerationStrategy`] whether pods must be replaced, and
//! writes the desired spec. The generation bump travels in the same write
//! as the spec, so a pass either lands completely or not at all.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::StatefulSet;
use serde::Serialize;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::OperatorConfig;
use crate::error::{ApiError, ReconcileError, Result};
use crate::rollout::{DiffEngine, GenerationStrategy, StructuralDiff, DEFAULT_GENERATION_ANNOTATION};
use crate::store::{WorkloadApi, WorkloadKey};

use super::context::ReconciliationContext;
use super::locks::KeyedLocks;

/// Tunables of the reconciliation driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Maximum attempts per pass for retryable errors.
    pub max_attempts: u32,
    /// Delay between attempts after a timeout or unavailability.
    pub retry_backoff: Duration,
    /// Upper bound for each API call.
    pub operation_timeout: Duration,
    /// Pod template annotation holding the generation marker.
    pub generation_annotation: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(300),
            generation_annotation: DEFAULT_GENERATION_ANNOTATION.to_string(),
        }
    }
}

impl From<&OperatorConfig> for ReconcileSettings {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            max_attempts: config.reconcile.max_attempts,
            retry_backoff: Duration::from_millis(config.reconcile.retry_backoff_ms),
            operation_timeout: Duration::from_millis(config.operator.operation_timeout_ms),
            generation_annotation: config.operator.generation_annotation.clone(),
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    /// Live and desired specs already match; nothing was written.
    NoAction,
    /// The spec was written with the generation marker unchanged.
    AppliedNoRestart,
    /// The spec was written with a bumped generation marker.
    AppliedWithRestart,
    /// The workload did not exist and was created.
    Created,
    /// The workload was no longer desired and was deleted.
    Deleted,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Identifier of the reconciliation.
    pub reconciliation_id: Uuid,
    /// Workload kind.
    pub kind: String,
    /// Reconciled resource, as `namespace/name`.
    pub resource: String,
    /// How the pass ended.
    pub outcome: PassOutcome,
    /// Generation marker after the pass, if the workload exists.
    pub generation: Option<u64>,
    /// Diff computed during the pass, if any.
    pub diff: Option<StructuralDiff>,
    /// Attempts used.
    pub attempts: u32,
}

/// Reconciliation driver for any managed workload set.
pub struct SetReconciler<A: WorkloadApi> {
    /// Workload API.
    api: Arc<A>,
    /// Decision seam.
    strategy: Arc<dyn GenerationStrategy>,
    /// Diff engine.
    diff_engine: DiffEngine,
    /// Driver tunables.
    settings: ReconcileSettings,
    /// Per-resource pass serialization.
    locks: KeyedLocks<WorkloadKey>,
}

impl<A: WorkloadApi> SetReconciler<A> {
    /// Creates a new reconciler.
    ///
    /// Every pass makes at least one attempt, whatever `max_attempts` says.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff engine cannot be built.
    pub fn new(
        api: Arc<A>,
        strategy: Arc<dyn GenerationStrategy>,
        mut settings: ReconcileSettings,
    ) -> Result<Self> {
        settings.max_attempts = settings.max_attempts.max(1);
        Ok(Self {
            api,
            strategy,
            diff_engine: DiffEngine::new(&settings.generation_annotation)?,
            settings,
            locks: KeyedLocks::new(),
        })
    }

    /// Returns the driver settings.
    #[must_use]
    pub const fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Reconciles one workload towards `desired`; `None` means it should not exist.
    ///
    /// Passes for the same key run one at a time.
    ///
    /// # Errors
    ///
    /// Returns fatal errors immediately, and retryable ones once
    /// `max_attempts` is exhausted.
    pub async fn reconcile(
        &self,
        ctx: &ReconciliationContext,
        key: &WorkloadKey,
        desired: Option<StatefulSet>,
    ) -> Result<PassReport> {
        let _guard = self.locks.lock(key.clone()).await;

        async {
            info!("{ctx}: reconciling against {} backend", self.api.backend_type());

            let mut last_error = None;
            for attempt in 1..=self.settings.max_attempts {
                debug!("{ctx}: attempt {attempt}/{}", self.settings.max_attempts);

                match self.reconcile_once(ctx, key, desired.as_ref()).await {
                    Ok(mut report) => {
                        report.attempts = attempt;
                        info!("{ctx}: {}", report.outcome);
                        return Ok(report);
                    }
                    Err(err) if err.is_retryable() => {
                        warn!("{ctx}: attempt {attempt} failed: {err}");
                        let delay = err.retry_delay_ms(duration_ms(self.settings.retry_backoff));
                        last_error = Some(err);

                        if attempt < self.settings.max_attempts
                            && let Some(delay) = delay.filter(|d| *d > 0)
                        {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                    }
                    Err(err) => {
                        error!("{ctx}: failed: {err}");
                        return Err(err);
                    }
                }
            }

            Err(ReconcileError::MaxRetriesExceeded {
                attempts: self.settings.max_attempts,
                resource: key.to_string(),
                last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
            }
            .into())
        }
        .instrument(ctx.span().clone())
        .await
    }

    /// Performs a single reconciliation attempt.
    async fn reconcile_once(
        &self,
        ctx: &ReconciliationContext,
        key: &WorkloadKey,
        desired: Option<&StatefulSet>,
    ) -> Result<PassReport> {
        let current = self.timed("get", key, self.api.get(key)).await?;
        let annotation = self.settings.generation_annotation.as_str();

        match (current, desired) {
            (None, None) => {
                debug!("{ctx}: absent and not desired");
                Ok(report(ctx, key, PassOutcome::NoAction, None, None))
            }
            (Some(_), None) => {
                self.timed("delete", key, self.api.delete(key)).await?;
                Ok(report(ctx, key, PassOutcome::Deleted, None, None))
            }
            (None, Some(desired)) => {
                let object = with_generation(desired.clone(), annotation, 0);
                self.timed("create", key, self.api.create(key, object)).await?;
                Ok(report(ctx, key, PassOutcome::Created, Some(0), None))
            }
            (Some(current), Some(desired)) => {
                let diff = self.diff_engine.compute(&current, desired)?;
                let current_generation = generation_of(&current, annotation);

                if diff.is_empty() {
                    debug!("{ctx}: live spec matches desired spec");
                    return Ok(report(
                        ctx,
                        key,
                        PassOutcome::NoAction,
                        Some(current_generation),
                        Some(diff),
                    ));
                }

                let bump = self.strategy.should_increment_generation(ctx, &diff);
                let generation = if bump {
                    current_generation.saturating_add(1)
                } else {
                    current_generation
                };

                debug!(
                    "{ctx}: applying {} changed paths, generation {current_generation} -> {generation}",
                    diff.changed_paths().len()
                );

                let mut patched = with_generation(desired.clone(), annotation, generation);
                patched.metadata.resource_version.clone_from(&current.metadata.resource_version);
                self.timed("replace", key, self.api.replace(key, patched)).await?;

                let outcome = if bump {
                    PassOutcome::AppliedWithRestart
                } else {
                    PassOutcome::AppliedNoRestart
                };
                Ok(report(ctx, key, outcome, Some(generation), Some(diff)))
            }
        }
    }

    /// Bounds an API call by the operation timeout.
    async fn timed<T>(
        &self,
        operation: &str,
        key: &WorkloadKey,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                operation: operation.to_string(),
                key: key.to_string(),
                timeout_ms: duration_ms(self.settings.operation_timeout),
            }
            .into()),
        }
    }
}

fn report(
    ctx: &ReconciliationContext,
    key: &WorkloadKey,
    outcome: PassOutcome,
    generation: Option<u64>,
    diff: Option<StructuralDiff>,
) -> PassReport {
    PassReport {
        reconciliation_id: ctx.id(),
        kind: ctx.kind().to_string(),
        resource: key.to_string(),
        outcome,
        generation,
        diff,
        attempts: 1,
    }
}

/// Reads the generation marker from the pod template; missing or
/// unparsable markers count as generation 0.
#[must_use]
pub fn generation_of(object: &StatefulSet, annotation: &str) -> u64 {
    object
        .spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.annotations.as_ref())
        .and_then(|annotations| annotations.get(annotation))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Stamps the generation marker onto the pod template.
fn with_generation(mut object: StatefulSet, annotation: &str, generation: u64) -> StatefulSet {
    let spec = object.spec.get_or_insert_with(Default::default);
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(annotation.to_string(), generation.to_string());
    object
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoAction => "no action",
            Self::AppliedNoRestart => "applied without restart",
            Self::AppliedWithRestart => "applied with rolling restart",
            Self::Created => "created",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.resource, self.outcome)?;
        if let Some(generation) = self.generation {
            write!(f, " (generation {generation})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperatorError;
    use crate::reconciler::Trigger;
    use crate::rollout::{WorkloadSpecialization, ZOOKEEPER_KIND};
    use crate::store::{InMemoryWorkloadApi, MockWorkloadApi};
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use k8s_openapi::api::core::v1::{
        Container, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec,
        VolumeResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ensemble(image: &str, size: &str, replicas: i32) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                name: Some(String::from("zk")),
                namespace: Some(String::from("kafka")),
                labels: Some([(String::from("app"), String::from("zk"))].into_iter().collect()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: String::from("zookeeper"),
                            image: Some(image.to_string()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                volume_claim_templates: Some(vec![PersistentVolumeClaim {
                    metadata: ObjectMeta {
                        name: Some(String::from("data")),
                        ..Default::default()
                    },
                    spec: Some(PersistentVolumeClaimSpec {
                        resources: Some(VolumeResourceRequirements {
                            requests: Some(
                                [(String::from("storage"), Quantity(size.to_string()))]
                                    .into_iter()
                                    .collect(),
                            ),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn key() -> WorkloadKey {
        WorkloadKey::new("kafka", "zk")
    }

    fn context() -> ReconciliationContext {
        ReconciliationContext::new(ZOOKEEPER_KIND, key(), Trigger::Manual)
    }

    fn fast_settings() -> ReconcileSettings {
        ReconcileSettings {
            retry_backoff: Duration::from_millis(1),
            operation_timeout: Duration::from_millis(200),
            ..ReconcileSettings::default()
        }
    }

    fn reconciler<A: WorkloadApi>(api: Arc<A>) -> SetReconciler<A> {
        SetReconciler::new(
            api,
            Arc::new(WorkloadSpecialization::zookeeper()),
            fast_settings(),
        )
        .expect("reconciler")
    }

    async fn stored_generation(api: &InMemoryWorkloadApi) -> u64 {
        let stored = api.get(&key()).await.expect("get").expect("stored");
        generation_of(&stored, DEFAULT_GENERATION_ANNOTATION)
    }

    #[tokio::test]
    async fn test_create_then_no_action() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));

        let created = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");
        assert_eq!(created.outcome, PassOutcome::Created);
        assert_eq!(stored_generation(&api).await, 0);

        let repeat = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("repeat pass");
        assert_eq!(repeat.outcome, PassOutcome::NoAction);
        assert_eq!(repeat.generation, Some(0));
    }

    #[tokio::test]
    async fn test_template_change_bumps_generation() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));
        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");

        let report = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.9", "10Gi", 3)))
            .await
            .expect("update pass");

        assert_eq!(report.outcome, PassOutcome::AppliedWithRestart);
        assert_eq!(report.generation, Some(1));
        assert_eq!(stored_generation(&api).await, 1);
    }

    #[tokio::test]
    async fn test_size_change_applies_without_restart() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));
        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");

        let report = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "20Gi", 3)))
            .await
            .expect("resize pass");

        assert_eq!(report.outcome, PassOutcome::AppliedNoRestart);
        assert_eq!(stored_generation(&api).await, 0);

        let stored = api.get(&key()).await.expect("get").expect("stored");
        let size = stored
            .spec
            .and_then(|s| s.volume_claim_templates)
            .and_then(|claims| claims.into_iter().next())
            .and_then(|claim| claim.spec)
            .and_then(|spec| spec.resources)
            .and_then(|resources| resources.requests)
            .and_then(|requests| requests.get("storage").cloned());
        assert_eq!(size, Some(Quantity(String::from("20Gi"))));
    }

    #[tokio::test]
    async fn test_unmodeled_change_is_written_without_bump() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));
        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");

        let report = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 5)))
            .await
            .expect("scale pass");

        assert_eq!(report.outcome, PassOutcome::AppliedNoRestart);
        assert_eq!(stored_generation(&api).await, 0);
    }

    #[tokio::test]
    async fn test_generation_keeps_counting() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));

        for (image, expected) in [("zk:3.8", 0), ("zk:3.9", 1), ("zk:3.9", 1), ("zk:3.10", 2)] {
            reconciler
                .reconcile(&context(), &key(), Some(ensemble(image, "10Gi", 3)))
                .await
                .expect("pass");
            assert_eq!(stored_generation(&api).await, expected, "after {image}");
        }
    }

    #[tokio::test]
    async fn test_delete_when_not_desired() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = reconciler(Arc::clone(&api));
        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");

        let deleted = reconciler.reconcile(&context(), &key(), None).await.expect("delete pass");
        assert_eq!(deleted.outcome, PassOutcome::Deleted);

        let absent = reconciler.reconcile(&context(), &key(), None).await.expect("noop pass");
        assert_eq!(absent.outcome, PassOutcome::NoAction);
    }

    #[tokio::test]
    async fn test_injected_strategy_controls_bump() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let never: Arc<dyn GenerationStrategy> =
            Arc::new(|_: &ReconciliationContext, _: &StructuralDiff| false);
        let reconciler =
            SetReconciler::new(Arc::clone(&api), never, fast_settings()).expect("reconciler");

        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");
        let report = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.9", "10Gi", 3)))
            .await
            .expect("update pass");

        assert_eq!(report.outcome, PassOutcome::AppliedNoRestart);
        assert_eq!(stored_generation(&api).await, 0);
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let mut api = MockWorkloadApi::new();
        let replaces = Arc::new(AtomicU32::new(0));

        api.expect_backend_type().return_const("mock");
        api.expect_get().returning(|_| {
            let mut current = ensemble("zk:3.8", "10Gi", 3);
            current.metadata.resource_version = Some(String::from("7"));
            Ok(Some(current))
        });
        {
            let replaces = Arc::clone(&replaces);
            api.expect_replace().returning(move |key, object| {
                if replaces.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ApiError::Conflict {
                        key: key.to_string(),
                        expected: String::from("7"),
                        found: String::from("8"),
                    }
                    .into())
                } else {
                    Ok(object)
                }
            });
        }

        let report = reconciler(Arc::new(api))
            .reconcile(&context(), &key(), Some(ensemble("zk:3.9", "10Gi", 3)))
            .await
            .expect("pass succeeds on retry");

        assert_eq!(report.attempts, 2);
        assert_eq!(report.outcome, PassOutcome::AppliedWithRestart);
        assert_eq!(replaces.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut api = MockWorkloadApi::new();
        api.expect_backend_type().return_const("mock");
        api.expect_get()
            .times(3)
            .returning(|_| Err(ApiError::unavailable("connection refused").into()));

        let err = reconciler(Arc::new(api))
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect_err("retries exhausted");

        assert!(matches!(
            err,
            OperatorError::Reconcile(ReconcileError::MaxRetriesExceeded { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_makes_one() {
        let mut api = MockWorkloadApi::new();
        api.expect_backend_type().return_const("mock");
        api.expect_get()
            .times(1)
            .returning(|_| Err(ApiError::unavailable("connection refused").into()));

        let settings = ReconcileSettings {
            max_attempts: 0,
            ..fast_settings()
        };
        let reconciler = SetReconciler::new(
            Arc::new(api),
            Arc::new(WorkloadSpecialization::zookeeper()),
            settings,
        )
        .expect("reconciler");
        assert_eq!(reconciler.settings().max_attempts, 1);

        let err = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect_err("retries exhausted");
        match err {
            OperatorError::Reconcile(ReconcileError::MaxRetriesExceeded {
                attempts,
                last_error,
                ..
            }) => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let mut api = MockWorkloadApi::new();
        api.expect_backend_type().return_const("mock");
        api.expect_get()
            .times(1)
            .returning(|_| Err(ApiError::corrupted("bad json").into()));

        let err = reconciler(Arc::new(api))
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect_err("fatal error");

        assert!(matches!(err, OperatorError::Api(ApiError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_slow_api_times_out() {
        struct SlowApi;

        #[async_trait::async_trait]
        impl WorkloadApi for SlowApi {
            async fn get(&self, _key: &WorkloadKey) -> Result<Option<StatefulSet>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(None)
            }
            async fn create(&self, _key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
                Ok(object)
            }
            async fn replace(&self, _key: &WorkloadKey, object: StatefulSet) -> Result<StatefulSet> {
                Ok(object)
            }
            async fn delete(&self, _key: &WorkloadKey) -> Result<()> {
                Ok(())
            }
            async fn list(&self) -> Result<Vec<StatefulSet>> {
                Ok(Vec::new())
            }
            fn backend_type(&self) -> &'static str {
                "slow"
            }
        }

        let settings = ReconcileSettings {
            max_attempts: 1,
            operation_timeout: Duration::from_millis(20),
            ..fast_settings()
        };
        let reconciler = SetReconciler::new(
            Arc::new(SlowApi),
            Arc::new(WorkloadSpecialization::zookeeper()),
            settings,
        )
        .expect("reconciler");

        let err = reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            OperatorError::Reconcile(ReconcileError::MaxRetriesExceeded { attempts: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_passes_on_one_resource_are_serialized() {
        let api = Arc::new(InMemoryWorkloadApi::new());
        let reconciler = Arc::new(reconciler(Arc::clone(&api)));
        reconciler
            .reconcile(&context(), &key(), Some(ensemble("zk:3.8", "10Gi", 3)))
            .await
            .expect("create pass");

        let mut tasks = tokio::task::JoinSet::new();
        for image in ["zk:3.9", "zk:3.10", "zk:3.11", "zk:3.12"] {
            let reconciler = Arc::clone(&reconciler);
            tasks.spawn(async move {
                reconciler
                    .reconcile(&context(), &key(), Some(ensemble(image, "10Gi", 3)))
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let report = joined.expect("task").expect("pass");
            assert_eq!(report.attempts, 1);
            assert_eq!(report.outcome, PassOutcome::AppliedWithRestart);
        }
        assert_eq!(stored_generation(&api).await, 4);
    }
}
