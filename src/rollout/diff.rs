//! Structural diff between the live and desired `StatefulSet`.
//!
//! The engine walks both snapshots field by field and records the JSON
//! pointer of every leaf that differs. Fields the orchestrator fills in on
//! its own are skipped, so consecutive reconciliations of an unchanged
//! desired spec never produce a diff.

use std::collections::BTreeSet;

use k8s_openapi::api::apps::v1::StatefulSet;
use regex::{Regex, RegexSet};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DiffError, Result};

/// Default pod template annotation carrying the generation marker.
pub const DEFAULT_GENERATION_ANNOTATION: &str = "ensemble.io/generation";

/// Paths that never count as a change, whatever the desired side says.
const IGNORED_PATHS: &[&str] = &[r"^/spec/volumeClaimTemplates/[0-9]+/status(/|$)"];

/// Paths the orchestrator defaults when the desired side leaves them unset.
const DEFAULTED_PATHS: &[&str] = &[
    r"^/spec/revisionHistoryLimit$",
    r"^/spec/podManagementPolicy$",
    r"^/spec/updateStrategy(/|$)",
    r"^/spec/persistentVolumeClaimRetentionPolicy(/|$)",
    r"^/spec/template/spec/dnsPolicy$",
    r"^/spec/template/spec/restartPolicy$",
    r"^/spec/template/spec/schedulerName$",
    r"^/spec/template/spec/securityContext(/|$)",
    r"^/spec/template/spec/terminationGracePeriodSeconds$",
    r"^/spec/template/spec/serviceAccount$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/imagePullPolicy$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/terminationMessagePath$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/terminationMessagePolicy$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/(livenessProbe|readinessProbe|startupProbe)/(failureThreshold|periodSeconds|successThreshold|timeoutSeconds)$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/(livenessProbe|readinessProbe|startupProbe)/httpGet/scheme$",
    r"^/spec/template/spec/(initContainers|containers)/[0-9]+/env/[0-9]+/valueFrom/fieldRef/apiVersion$",
    r"^/spec/template/spec/volumes/[0-9]+/(configMap|secret|projected)/defaultMode$",
    r"^/spec/volumeClaimTemplates/[0-9]+/(kind|apiVersion)$",
    r"^/spec/volumeClaimTemplates/[0-9]+/spec/volumeMode$",
];

const LABELS_PATTERN: &str = r"^/metadata/labels(/|$)";
const TEMPLATE_PATTERN: &str = r"^/spec/template(/|$)";
const CLAIM_TEMPLATES_PATTERN: &str = r"^/spec/volumeClaimTemplates(/|$)";
const VOLUME_SIZE_PATTERN: &str = r"^/spec/volumeClaimTemplates/[0-9]+/spec/resources/requests/storage$";
const QUANTITY_PATTERN: &str = r"/resources/(requests|limits)/[^/]+$";

/// Which modeled facets of a workload spec changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DiffFacets {
    /// The set's own labels changed.
    pub labels: bool,
    /// The pod template changed (image, env, resources, ...).
    pub pod_template: bool,
    /// The volume claim templates changed in a way other than storage size.
    pub volume_claim_templates: bool,
    /// The storage request of a volume claim template changed.
    pub volume_size: bool,
}

/// Result of comparing two workload snapshots.
///
/// `is_empty` is tracked on its own: a diff may touch fields outside the
/// four modeled facets, in which case it is non-empty with every facet false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuralDiff {
    facets: DiffFacets,
    is_empty: bool,
    changed_paths: Vec<String>,
}

impl StructuralDiff {
    /// Builds a diff from facets computed elsewhere.
    #[must_use]
    pub const fn from_facets(facets: DiffFacets, is_empty: bool) -> Self {
        Self {
            facets,
            is_empty,
            changed_paths: Vec::new(),
        }
    }

    /// A diff with no changes.
    #[must_use]
    pub const fn empty() -> Self {
        Self::from_facets(
            DiffFacets {
                labels: false,
                pod_template: false,
                volume_claim_templates: false,
                volume_size: false,
            },
            true,
        )
    }

    /// Returns true if nothing changed between the snapshots.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Returns true if the set's labels changed.
    #[must_use]
    pub const fn labels_changed(&self) -> bool {
        self.facets.labels
    }

    /// Returns true if the pod template changed.
    #[must_use]
    pub const fn pod_template_changed(&self) -> bool {
        self.facets.pod_template
    }

    /// Returns true if the volume claim templates changed structurally.
    #[must_use]
    pub const fn volume_claim_templates_changed(&self) -> bool {
        self.facets.volume_claim_templates
    }

    /// Returns true if a volume claim template's storage size changed.
    #[must_use]
    pub const fn volume_size_changed(&self) -> bool {
        self.facets.volume_size
    }

    /// Returns the modeled facets.
    #[must_use]
    pub const fn facets(&self) -> DiffFacets {
        self.facets
    }

    /// Returns the JSON pointers of every changed field, sorted.
    #[must_use]
    pub fn changed_paths(&self) -> &[String] {
        &self.changed_paths
    }
}

/// Engine for computing structural diffs between `StatefulSet` snapshots.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    generation_path: String,
    ignored: RegexSet,
    defaulted: RegexSet,
    labels: Regex,
    template: Regex,
    claim_templates: Regex,
    volume_size: Regex,
    quantity: Regex,
}

impl DiffEngine {
    /// Creates a diff engine that ignores the given generation annotation.
    ///
    /// # Errors
    ///
    /// Returns an error if a path pattern fails to compile.
    pub fn new(generation_annotation: &str) -> Result<Self> {
        Ok(Self {
            generation_path: format!(
                "/spec/template/metadata/annotations/{}",
                escape_segment(generation_annotation)
            ),
            ignored: compile_set(IGNORED_PATHS)?,
            defaulted: compile_set(DEFAULTED_PATHS)?,
            labels: compile(LABELS_PATTERN)?,
            template: compile(TEMPLATE_PATTERN)?,
            claim_templates: compile(CLAIM_TEMPLATES_PATTERN)?,
            volume_size: compile(VOLUME_SIZE_PATTERN)?,
            quantity: compile(QUANTITY_PATTERN)?,
        })
    }

    /// Computes the diff from `current` to `desired`.
    ///
    /// # Errors
    ///
    /// Returns an error if either snapshot cannot be serialized.
    pub fn compute(&self, current: &StatefulSet, desired: &StatefulSet) -> Result<StructuralDiff> {
        let current = project(current, "current")?;
        let desired = project(desired, "desired")?;

        let mut changed = BTreeSet::new();
        let mut path = String::new();
        self.walk(&mut path, Some(&current), Some(&desired), &mut changed);

        let mut facets = DiffFacets::default();
        for changed_path in &changed {
            self.classify(changed_path, &mut facets);
        }

        debug!(
            "Computed diff: {} changed paths, facets {:?}",
            changed.len(),
            facets
        );

        Ok(StructuralDiff {
            facets,
            is_empty: changed.is_empty(),
            changed_paths: changed.into_iter().collect(),
        })
    }

    fn walk(
        &self,
        path: &mut String,
        current: Option<&Value>,
        desired: Option<&Value>,
        changed: &mut BTreeSet<String>,
    ) {
        match (present(current), present(desired)) {
            (None, None) => {}
            (Some(Value::Object(c)), Some(Value::Object(d))) => {
                self.walk_object(path, Some(c), Some(d), changed);
            }
            (Some(Value::Object(c)), None) => self.walk_object(path, Some(c), None, changed),
            (None, Some(Value::Object(d))) => self.walk_object(path, None, Some(d), changed),
            (Some(Value::Array(c)), Some(Value::Array(d))) => {
                self.walk_array(path, c, d, changed);
            }
            (Some(Value::Array(c)), None) => self.walk_array(path, c, &[], changed),
            (None, Some(Value::Array(d))) => self.walk_array(path, &[], d, changed),
            (Some(c), Some(d)) => {
                if !self.leaf_equal(path, c, d) {
                    self.record(path, true, changed);
                }
            }
            (_, d) => self.record(path, d.is_some(), changed),
        }
    }

    fn walk_object(
        &self,
        path: &mut String,
        current: Option<&Map<String, Value>>,
        desired: Option<&Map<String, Value>>,
        changed: &mut BTreeSet<String>,
    ) {
        let keys: BTreeSet<&String> = current
            .into_iter()
            .flat_map(Map::keys)
            .chain(desired.into_iter().flat_map(Map::keys))
            .collect();

        for key in keys {
            let len = path.len();
            path.push('/');
            path.push_str(&escape_segment(key));
            self.walk(
                path,
                current.and_then(|m| m.get(key)),
                desired.and_then(|m| m.get(key)),
                changed,
            );
            path.truncate(len);
        }
    }

    fn walk_array(
        &self,
        path: &mut String,
        current: &[Value],
        desired: &[Value],
        changed: &mut BTreeSet<String>,
    ) {
        for index in 0..current.len().max(desired.len()) {
            let len = path.len();
            path.push('/');
            path.push_str(&index.to_string());
            self.walk(path, current.get(index), desired.get(index), changed);
            path.truncate(len);
        }
    }

    fn leaf_equal(&self, path: &str, current: &Value, desired: &Value) -> bool {
        if current == desired {
            return true;
        }
        if self.quantity.is_match(path)
            && let (Some(c), Some(d)) = (current.as_str(), desired.as_str())
            && let (Some(c), Some(d)) = (parse_quantity(c), parse_quantity(d))
        {
            return (c - d).abs() <= f64::EPSILON * c.abs().max(d.abs());
        }
        false
    }

    fn record(&self, path: &str, desired_present: bool, changed: &mut BTreeSet<String>) {
        if path == self.generation_path || self.ignored.is_match(path) {
            return;
        }
        if !desired_present && self.defaulted.is_match(path) {
            return;
        }
        changed.insert(path.to_string());
    }

    fn classify(&self, path: &str, facets: &mut DiffFacets) {
        if self.labels.is_match(path) {
            facets.labels = true;
        } else if self.template.is_match(path) {
            facets.pod_template = true;
        } else if self.volume_size.is_match(path) {
            facets.volume_size = true;
        } else if self.claim_templates.is_match(path) {
            facets.volume_claim_templates = true;
        }
    }
}

/// Reduces a `StatefulSet` to the parts a reconciliation owns.
fn project(set: &StatefulSet, side: &'static str) -> Result<Value> {
    let to_value = |value: serde_json::Result<Value>| {
        value.map_err(|e| DiffError::Serialization {
            side,
            message: e.to_string(),
        })
    };

    let mut metadata = Map::new();
    metadata.insert(
        String::from("labels"),
        to_value(serde_json::to_value(&set.metadata.labels))?,
    );
    metadata.insert(
        String::from("annotations"),
        to_value(serde_json::to_value(&set.metadata.annotations))?,
    );

    let mut root = Map::new();
    root.insert(String::from("metadata"), Value::Object(metadata));
    root.insert(String::from("spec"), to_value(serde_json::to_value(&set.spec))?);
    Ok(Value::Object(root))
}

/// Treats `null` and empty collections as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    })
}

/// Escapes a key for use as a JSON pointer segment.
fn escape_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        DiffError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn compile_set(patterns: &[&str]) -> Result<RegexSet> {
    RegexSet::new(patterns).map_err(|e| {
        DiffError::InvalidPattern {
            pattern: patterns.join(" | "),
            message: e.to_string(),
        }
        .into()
    })
}

/// Binary suffixes are listed first so `Mi` is never read as `M`.
const QUANTITY_SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parses a Kubernetes resource quantity such as `10Gi` or `500m`.
fn parse_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    for (suffix, multiplier) in QUANTITY_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * multiplier);
        }
    }
    raw.parse::<f64>().ok()
}
