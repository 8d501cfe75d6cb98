// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use opkit::instance::{AnnotationSnapshotStore, ExecutionStatus, Instance, SnapshotStore};
use opkit::package::{Package, PackageReference, Parameter, Plan};
use opkit::{CatalogResolver, start_plan_execution, update_instance_status};

/// A package with a single `deploy` plan
pub fn operator(name: &str, version: &str) -> Package {
    Package::new(name, version).with_plan("deploy", Plan::serial(&[("main", &["everything"])]))
}

/// Catalog with a diamond: kafka -> {zookeeper, metrics}, zookeeper -> metrics
///
/// Two zookeeper versions are registered so unpinned references pick 0.4.0.
pub fn diamond_catalog() -> CatalogResolver {
    CatalogResolver::new()
        .with(
            operator("kafka", "1.3.0")
                .with_app_version("2.5.1")
                .depends_on(PackageReference::new("zookeeper"))
                .depends_on(PackageReference::new("metrics")),
        )
        .with(operator("zookeeper", "0.3.0").depends_on(PackageReference::new("metrics")))
        .with(operator("zookeeper", "0.4.0").depends_on(PackageReference::new("metrics")))
        .with(operator("metrics", "0.1.0"))
}

/// A package version defining every reserved plan plus `backup`
///
/// `BACKUP_NOW` triggers `backup`, `IMAGE` and `REPLICAS` trigger `deploy`,
/// `TUNING` triggers `update`, `LOG_LEVEL` triggers nothing.
pub fn database(version: &str) -> Package {
    Package::new("database", version)
        .with_plan(
            "deploy",
            Plan::serial(&[("deploy", &["statefulset", "service"]), ("verify", &["smoke"])]),
        )
        .with_plan("update", Plan::serial(&[("update", &["statefulset"])]))
        .with_plan("upgrade", Plan::serial(&[("upgrade", &["migrate", "statefulset"])]))
        .with_plan("backup", Plan::serial(&[("backup", &["dump"])]))
        .with_plan("cleanup", Plan::serial(&[("cleanup", &["remove-volumes"])]))
        .with_parameter(Parameter::new("BACKUP_NOW").with_trigger("backup"))
        .with_parameter(Parameter::new("IMAGE").with_trigger("deploy"))
        .with_parameter(Parameter::new("REPLICAS").with_trigger("deploy").with_default("1"))
        .with_parameter(Parameter::new("TUNING").with_trigger("update"))
        .with_parameter(Parameter::new("LOG_LEVEL"))
}

/// An instance of `package` whose deploy plan ran to completion
pub fn deployed_instance(package: &Package, store: &dyn SnapshotStore) -> Instance {
    let mut instance = Instance::new("orders-db", &package.fully_qualified_name())
        .with_namespace("shop")
        .with_parameter("IMAGE", "postgres:16")
        .with_parameter("REPLICAS", "3");

    start_plan_execution(&mut instance, "deploy", package, store).unwrap();
    finish(&mut instance, "deploy", ExecutionStatus::Complete);
    instance
}

/// Report a whole plan as finished with `status`
pub fn finish(instance: &mut Instance, plan: &str, status: ExecutionStatus) {
    let mut reported = instance.plan_status(plan).unwrap().clone();
    reported.set_all(status);
    update_instance_status(instance, reported).unwrap();
}

pub fn store() -> AnnotationSnapshotStore {
    AnnotationSnapshotStore::default()
}
