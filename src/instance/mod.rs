// src/instance/mod.rs

//! Instances of a package version and their rollout state
//!
//! An [`Instance`] binds a package version to concrete parameter values and
//! records the execution status of every plan the version defines. The
//! submodules split the rollout machinery:
//!
//! - [`status`]: the plan/phase/step status tree and its state machine
//! - [`lifecycle`]: initializing, starting and updating plan runs
//! - [`snapshot`]: the last applied spec kept in instance metadata
//! - [`decision`]: choosing which plan must run next
//! - [`reconcile`]: one reconciliation pass tying the above together

pub mod decision;
pub mod lifecycle;
pub mod reconcile;
pub mod snapshot;
pub mod status;

pub use decision::plan_to_be_executed;
pub use lifecycle::{ensure_plan_status_initialized, start_plan_execution, update_instance_status};
pub use reconcile::Reconciler;
pub use snapshot::{AnnotationSnapshotStore, SnapshotStore};
pub use status::{AggregatedStatus, ExecutionStatus, PhaseStatus, PlanStatus, StepStatus};

use crate::error::Result;
use crate::package::{CLEANUP_PLAN, Package, check_immutable_parameters, validate_parameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Finalizer that holds back deletion until the cleanup plan has run
pub const CLEANUP_FINALIZER: &str = "opkit.dev.instance.cleanup";

/// Object metadata the control plane keeps for an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Set once deletion has been requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

/// Reference to the package version an instance is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl PackageVersionRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: String::new(),
        }
    }
}

/// Desired state of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub package_version: PackageVersionRef,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Observed rollout state of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Plan name -> status tree; iteration order carries no meaning
    #[serde(default)]
    pub plan_status: HashMap<String, PlanStatus>,
    #[serde(default)]
    pub aggregated_status: AggregatedStatus,
}

/// A deployment of one package version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub metadata: ObjectMeta,
    pub spec: InstanceSpec,
    #[serde(default)]
    pub status: InstanceStatus,
}

impl Instance {
    pub fn new(name: &str, package_version: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                ..ObjectMeta::default()
            },
            spec: InstanceSpec {
                package_version: PackageVersionRef::new(package_version),
                parameters: BTreeMap::new(),
            },
            status: InstanceStatus::default(),
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.metadata.namespace = namespace.to_string();
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.spec.parameters.insert(name.to_string(), value.to_string());
        self
    }

    /// `namespace/name`, or just the name outside a namespace
    pub fn qualified_name(&self) -> String {
        if self.metadata.namespace.is_empty() {
            self.metadata.name.clone()
        } else {
            format!("{}/{}", self.metadata.namespace, self.metadata.name)
        }
    }

    pub fn plan_status(&self, plan: &str) -> Option<&PlanStatus> {
        self.status.plan_status.get(plan)
    }

    pub fn plan_status_mut(&mut self, plan: &str) -> Option<&mut PlanStatus> {
        self.status.plan_status.get_mut(plan)
    }

    /// The plan currently scheduled or running, if any
    pub fn plan_in_progress(&self) -> Option<&PlanStatus> {
        self.status.plan_status.values().find(|p| p.status.is_running())
    }

    /// True if no plan status has ever left `NEVER_RUN`
    pub fn no_plan_ever_executed(&self) -> bool {
        self.status
            .plan_status
            .values()
            .all(|p| p.status == ExecutionStatus::NeverRun)
    }

    /// The running plan, or else the plan that was updated last
    pub fn last_executed_plan_status(&self) -> Option<&PlanStatus> {
        if let Some(running) = self.plan_in_progress() {
            return Some(running);
        }

        self.status
            .plan_status
            .values()
            .filter(|p| p.status != ExecutionStatus::NeverRun)
            .max_by(|a, b| a.last_updated.cmp(&b.last_updated).then_with(|| b.name.cmp(&a.name)))
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Mark the instance for deletion
    pub fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.metadata.deletion_timestamp = Some(at);
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add the cleanup finalizer while the cleanup plan has not run yet
    ///
    /// Returns true if the finalizer was added.
    pub fn try_add_cleanup_finalizer(&mut self, finalizer: &str, package: &Package) -> bool {
        let cleanup_pending = package.has_cleanup_plan()
            && self
                .plan_status(CLEANUP_PLAN)
                .is_some_and(|p| p.status == ExecutionStatus::NeverRun);

        if cleanup_pending && !self.has_finalizer(finalizer) {
            self.metadata.finalizers.push(finalizer.to_string());
            return true;
        }
        false
    }

    /// Drop the cleanup finalizer once cleanup is over or no longer defined
    ///
    /// A status entry left behind by an older package version does not hold
    /// the finalizer once the bound version has no cleanup plan.
    /// Returns true if the finalizer was removed.
    pub fn try_remove_cleanup_finalizer(&mut self, finalizer: &str, package: &Package) -> bool {
        if !self.has_finalizer(finalizer) {
            return false;
        }

        let release = match self.plan_status(CLEANUP_PLAN) {
            Some(cleanup) if package.has_cleanup_plan() => cleanup.status.is_terminal(),
            _ => true,
        };

        if release {
            self.metadata.finalizers.retain(|f| f != finalizer);
        }
        release
    }

    /// Validate this instance's parameter values against its package version
    pub fn validate(&self, package: &Package) -> Result<()> {
        validate_parameters(package, &self.spec.parameters)
    }

    /// Validate an update of this instance to `new`
    ///
    /// Immutable parameters may only change together with the package version.
    pub fn validate_update(&self, new: &Instance, package: &Package) -> Result<()> {
        if self.spec.package_version == new.spec.package_version {
            check_immutable_parameters(&self.spec.parameters, &new.spec.parameters, package)?;
        }
        new.validate(package)
    }

    /// Load an instance document from a TOML file, or JSON when the extension is `.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if is_json(path) {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    /// Write this instance back in the format implied by the file extension
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
