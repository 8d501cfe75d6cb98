// src/instance/reconcile.rs

//! One reconciliation pass over an instance
//!
//! The surrounding control loop serializes passes per instance; a pass
//! itself is a plain synchronous sequence of finalizer bookkeeping, a
//! decision, and possibly the start of a plan. Executing the active plan is
//! the executor's business, which reports back through
//! [`Reconciler::apply_executor_status`].

use super::snapshot::{AnnotationSnapshotStore, SnapshotStore};
use super::status::PlanStatus;
use super::{CLEANUP_FINALIZER, Instance, decision, lifecycle};
use crate::config::OpkitConfig;
use crate::error::Result;
use crate::package::Package;
use tracing::info;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Plan started by this pass
    pub started: Option<String>,
    pub finalizer_added: bool,
    pub finalizer_removed: bool,
}

/// Drives rollout decisions with one snapshot store and finalizer name
pub struct Reconciler {
    store: Box<dyn SnapshotStore>,
    cleanup_finalizer: String,
}

impl Reconciler {
    pub fn new(store: Box<dyn SnapshotStore>, cleanup_finalizer: &str) -> Self {
        Self {
            store,
            cleanup_finalizer: cleanup_finalizer.to_string(),
        }
    }

    pub fn from_config(config: &OpkitConfig) -> Self {
        Self::new(
            Box::new(AnnotationSnapshotStore::new(&config.snapshot_annotation)),
            &config.cleanup_finalizer,
        )
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    /// The plan that must start next, without changing anything
    pub fn next_plan(&self, instance: &Instance, package: &Package) -> Result<Option<String>> {
        decision::plan_to_be_executed(instance, package, self.store())
    }

    /// Start a plan explicitly
    pub fn start(&self, instance: &mut Instance, plan: &str, package: &Package) -> Result<()> {
        lifecycle::start_plan_execution(instance, plan, package, self.store())
    }

    /// Record a status reported by the executor and release the finalizer if due
    pub fn apply_executor_status(
        &self,
        instance: &mut Instance,
        package: &Package,
        plan_status: PlanStatus,
    ) -> Result<bool> {
        lifecycle::update_instance_status(instance, plan_status)?;
        Ok(self.release_finalizer(instance, package))
    }

    /// Run one pass: finalizers, decision, plan start
    pub fn reconcile(&self, instance: &mut Instance, package: &Package) -> Result<PassOutcome> {
        let mut outcome = PassOutcome::default();

        if !instance.is_deleting() {
            outcome.finalizer_added = instance.try_add_cleanup_finalizer(&self.cleanup_finalizer, package);
            if outcome.finalizer_added {
                info!("Adding finalizer on instance {}", instance.qualified_name());
            }
        }

        if let Some(plan) = self.next_plan(instance, package)? {
            self.start(instance, &plan, package)?;
            outcome.started = Some(plan);
        }

        outcome.finalizer_removed = self.release_finalizer(instance, package);
        Ok(outcome)
    }

    fn release_finalizer(&self, instance: &mut Instance, package: &Package) -> bool {
        let removed = instance.try_remove_cleanup_finalizer(&self.cleanup_finalizer, package);
        if removed {
            info!("Removing finalizer on instance {}", instance.qualified_name());
        }
        removed
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Box::new(AnnotationSnapshotStore::default()), CLEANUP_FINALIZER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ExecutionStatus, PackageVersionRef};
    use crate::package::Plan;

    fn package() -> Package {
        Package::new("zookeeper", "0.3.0")
            .with_plan("deploy", Plan::serial(&[("zookeeper", &["deploy"])]))
            .with_plan("cleanup", Plan::serial(&[("cleanup", &["remove-pvcs"])]))
    }

    #[test]
    fn test_first_pass_deploys_then_idles() {
        let reconciler = Reconciler::default();
        let package = package();
        let mut instance = Instance::new("zk", "zookeeper-0.3.0");

        let first = reconciler.reconcile(&mut instance, &package).unwrap();
        assert_eq!(first.started.as_deref(), Some("deploy"));
        // Cleanup status did not exist before the deploy initialized it
        assert!(!first.finalizer_added);

        let second = reconciler.reconcile(&mut instance, &package).unwrap();
        assert_eq!(second.started, None);
        assert!(second.finalizer_added);
        assert!(instance.has_finalizer(CLEANUP_FINALIZER));
    }

    #[test]
    fn test_deletion_runs_cleanup_and_releases_finalizer() {
        let reconciler = Reconciler::default();
        let package = package();
        let mut instance = Instance::new("zk", "zookeeper-0.3.0");

        reconciler.reconcile(&mut instance, &package).unwrap();
        let mut deployed = instance.plan_status("deploy").unwrap().clone();
        deployed.set_all(ExecutionStatus::Complete);
        reconciler.apply_executor_status(&mut instance, &package, deployed).unwrap();
        reconciler.reconcile(&mut instance, &package).unwrap();
        assert!(instance.has_finalizer(CLEANUP_FINALIZER));

        instance.mark_deleted(chrono::Utc::now());
        let pass = reconciler.reconcile(&mut instance, &package).unwrap();
        assert_eq!(pass.started.as_deref(), Some("cleanup"));
        assert!(!pass.finalizer_removed);

        let mut cleaned = instance.plan_status("cleanup").unwrap().clone();
        cleaned.set_all(ExecutionStatus::Complete);
        assert!(reconciler.apply_executor_status(&mut instance, &package, cleaned).unwrap());
        assert!(!instance.has_finalizer(CLEANUP_FINALIZER));

        let after = reconciler.reconcile(&mut instance, &package).unwrap();
        assert_eq!(after, PassOutcome::default());
    }

    #[test]
    fn test_upgrade_dropping_cleanup_releases_finalizer() {
        let reconciler = Reconciler::default();
        let package = package();
        let mut instance = Instance::new("zk", "zookeeper-0.3.0");

        reconciler.reconcile(&mut instance, &package).unwrap();
        let mut deployed = instance.plan_status("deploy").unwrap().clone();
        deployed.set_all(ExecutionStatus::Complete);
        reconciler.apply_executor_status(&mut instance, &package, deployed).unwrap();
        reconciler.reconcile(&mut instance, &package).unwrap();
        assert!(instance.has_finalizer(CLEANUP_FINALIZER));

        let upgraded = Package::new("zookeeper", "0.4.0")
            .with_plan("deploy", Plan::serial(&[("zookeeper", &["deploy"])]));
        instance.spec.package_version = PackageVersionRef::new("zookeeper-0.4.0");

        let pass = reconciler.reconcile(&mut instance, &upgraded).unwrap();
        assert_eq!(pass.started.as_deref(), Some("deploy"));
        assert!(pass.finalizer_removed);
        // The old cleanup status stays behind as history
        assert_eq!(
            instance.plan_status("cleanup").map(|p| p.status),
            Some(ExecutionStatus::NeverRun)
        );

        let mut redeployed = instance.plan_status("deploy").unwrap().clone();
        redeployed.set_all(ExecutionStatus::Complete);
        assert!(!reconciler.apply_executor_status(&mut instance, &upgraded, redeployed).unwrap());

        instance.mark_deleted(chrono::Utc::now());
        let after = reconciler.reconcile(&mut instance, &upgraded).unwrap();
        assert_eq!(after, PassOutcome::default());
        assert!(instance.metadata.finalizers.is_empty());
    }

    #[test]
    fn test_finalizer_left_by_older_version_released_on_delete() {
        let reconciler = Reconciler::default();
        let upgraded = Package::new("zookeeper", "0.4.0")
            .with_plan("deploy", Plan::serial(&[("zookeeper", &["deploy"])]));
        let mut instance = Instance::new("zk", "zookeeper-0.4.0");

        reconciler.reconcile(&mut instance, &upgraded).unwrap();
        let mut deployed = instance.plan_status("deploy").unwrap().clone();
        deployed.set_all(ExecutionStatus::Complete);
        reconciler.apply_executor_status(&mut instance, &upgraded, deployed).unwrap();

        // Leftovers of an older version that defined cleanup
        instance.metadata.finalizers.push(CLEANUP_FINALIZER.to_string());
        instance
            .status
            .plan_status
            .insert("cleanup".to_string(), PlanStatus::new("cleanup"));

        instance.mark_deleted(chrono::Utc::now());
        let pass = reconciler.reconcile(&mut instance, &upgraded).unwrap();
        assert_eq!(pass.started, None);
        assert!(pass.finalizer_removed);
        assert!(!instance.has_finalizer(CLEANUP_FINALIZER));
    }

    #[test]
    fn test_from_config_uses_configured_names() {
        let config = OpkitConfig {
            snapshot_annotation: "example.com/applied".to_string(),
            cleanup_finalizer: "example.com/cleanup".to_string(),
            ..OpkitConfig::default()
        };
        let reconciler = Reconciler::from_config(&config);
        let package = package();
        let mut instance = Instance::new("zk", "zookeeper-0.3.0");

        reconciler.reconcile(&mut instance, &package).unwrap();
        reconciler.reconcile(&mut instance, &package).unwrap();

        assert!(instance.metadata.annotations.contains_key("example.com/applied"));
        assert!(instance.has_finalizer("example.com/cleanup"));
    }
}
