// src/package/mod.rs

//! Operator package descriptions
//!
//! A package is one released version of an operator. It declares the tasks
//! its plans execute, the parameters an instance may set, and the plans
//! themselves as a plan -> phase -> step hierarchy.
//!
//! Tasks of kind `Operator` name another package; those references are what
//! the dependency walker in [`crate::resolver`] follows.

mod params;

pub use params::{
    Parameter, ParameterType, check_immutable_parameters, parameter_definitions,
    parameter_diff, rich_parameter_diff, validate_parameters,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Plan run when an instance is first created
pub const DEPLOY_PLAN: &str = "deploy";
/// Plan run after a parameter change without an explicit trigger
pub const UPDATE_PLAN: &str = "update";
/// Plan run when an instance moves to another package version
pub const UPGRADE_PLAN: &str = "upgrade";
/// Plan run when an instance is deleted
pub const CLEANUP_PLAN: &str = "cleanup";

/// Identity of a package version: the (name, app version, version) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageId {
    pub name: String,
    #[serde(default)]
    pub app_version: String,
    pub version: String,
}

impl PackageId {
    pub fn new(name: &str, app_version: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            app_version: app_version.to_string(),
            version: version.to_string(),
        }
    }

    /// Canonical `name-appVersion-version` form (`name-version` without an app version)
    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.name, &self.app_version, &self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name())
    }
}

/// Build the fully qualified name of a package version
///
/// Empty versions are left out, so an unpinned reference is just its name.
pub fn fully_qualified_name(name: &str, app_version: &str, version: &str) -> String {
    [name, app_version, version]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

/// Execution strategy of a plan or phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Serial,
    Parallel,
}

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Apply,
    Delete,
    Dummy,
    Pipe,
    Toggle,
    /// Installs another operator package as a dependency
    Operator,
}

/// Reference from an `Operator` task to the package it installs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReference {
    /// Package name, or a path (`./child`, `../sibling`, `/abs/dir`)
    pub package: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub operator_version: String,
}

impl PackageReference {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            ..Self::default()
        }
    }

    pub fn with_versions(mut self, app_version: &str, operator_version: &str) -> Self {
        self.app_version = app_version.to_string();
        self.operator_version = operator_version.to_string();
        self
    }

    /// Whether the reference is relative to the directory of the referencing package
    pub fn is_relative(&self) -> bool {
        self.package.starts_with("./") || self.package.starts_with("../")
    }

    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.package, &self.app_version, &self.operator_version)
    }
}

/// An atomic unit of work referenced by plan steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    /// Resource templates applied or deleted by the task
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Dependency reference, only meaningful for `Operator` tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageReference>,
}

impl Task {
    pub fn apply(name: &str, resources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: TaskKind::Apply,
            resources: resources.iter().map(|r| r.to_string()).collect(),
            package: None,
        }
    }

    pub fn operator(name: &str, reference: PackageReference) -> Self {
        Self {
            name: name.to_string(),
            kind: TaskKind::Operator,
            resources: Vec::new(),
            package: Some(reference),
        }
    }

    /// The dependency this task installs, if it is an `Operator` task
    pub fn package_reference(&self) -> Option<&PackageReference> {
        match self.kind {
            TaskKind::Operator => self.package.as_ref(),
            _ => None,
        }
    }
}

/// One step of a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Names of the tasks this step runs
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// A phase groups steps; declaration order is execution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A rollout workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Plan {
    /// Build a serial plan from `(phase, [steps])` pairs
    pub fn serial(phases: &[(&str, &[&str])]) -> Self {
        Self {
            strategy: Strategy::Serial,
            phases: phases
                .iter()
                .map(|(phase, steps)| Phase {
                    name: phase.to_string(),
                    strategy: Strategy::Serial,
                    steps: steps
                        .iter()
                        .map(|step| Step {
                            name: step.to_string(),
                            tasks: Vec::new(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// A released version of an operator package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub plans: BTreeMap<String, Plan>,
}

impl Package {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            ..Self::default()
        }
    }

    pub fn with_app_version(mut self, app_version: &str) -> Self {
        self.app_version = app_version.to_string();
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_plan(mut self, name: &str, plan: Plan) -> Self {
        self.plans.insert(name.to_string(), plan);
        self
    }

    /// Add a dependency on another package through an `Operator` task
    pub fn depends_on(self, reference: PackageReference) -> Self {
        let task_name = format!("install-{}", reference.package.trim_start_matches("./"));
        self.with_task(Task::operator(&task_name, reference))
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.app_version, &self.version)
    }

    pub fn fully_qualified_name(&self) -> String {
        fully_qualified_name(&self.name, &self.app_version, &self.version)
    }

    pub fn has_plan(&self, name: &str) -> bool {
        self.plans.contains_key(name)
    }

    pub fn has_cleanup_plan(&self) -> bool {
        self.has_plan(CLEANUP_PLAN)
    }

    /// Return the first candidate plan defined by this package
    pub fn select_plan(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find(|name| self.has_plan(name))
            .map(|name| name.to_string())
    }

    /// Look up a parameter definition by name
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Iterate over the `Operator` tasks and their dependency references
    pub fn dependency_tasks(&self) -> impl Iterator<Item = (usize, &PackageReference)> {
        self.tasks
            .iter()
            .enumerate()
            .filter_map(|(i, task)| task.package_reference().map(|r| (i, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_qualified_name() {
        assert_eq!(PackageId::new("kafka", "2.5.1", "1.3.0").to_string(), "kafka-2.5.1-1.3.0");
        assert_eq!(PackageId::new("zookeeper", "", "0.3.0").to_string(), "zookeeper-0.3.0");
        assert_eq!(PackageReference::new("zookeeper").fully_qualified_name(), "zookeeper");
    }

    #[test]
    fn test_identity_is_the_version_triple() {
        let a = Package::new("kafka", "1.3.0").with_app_version("2.5.1");
        let b = Package::new("kafka", "1.3.0")
            .with_app_version("2.5.1")
            .with_task(Task::apply("deploy", &["deployment.yaml"]));
        let c = Package::new("kafka", "1.3.0").with_app_version("2.6.0");

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_select_plan_respects_candidate_order() {
        let pkg = Package::new("redis", "0.1.0")
            .with_plan(DEPLOY_PLAN, Plan::default())
            .with_plan(UPDATE_PLAN, Plan::default());

        assert_eq!(
            pkg.select_plan(&[UPGRADE_PLAN, UPDATE_PLAN, DEPLOY_PLAN]),
            Some(UPDATE_PLAN.to_string())
        );
        assert_eq!(pkg.select_plan(&[CLEANUP_PLAN]), None);
    }

    #[test]
    fn test_dependency_tasks_skip_other_kinds() {
        let pkg = Package::new("kafka", "1.3.0")
            .with_task(Task::apply("app", &["sts.yaml"]))
            .depends_on(PackageReference::new("zookeeper"));

        let deps: Vec<_> = pkg.dependency_tasks().collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0, 1);
        assert_eq!(deps[0].1.package, "zookeeper");
    }

    #[test]
    fn test_relative_references() {
        assert!(PackageReference::new("./child").is_relative());
        assert!(PackageReference::new("../sibling").is_relative());
        assert!(!PackageReference::new("zookeeper").is_relative());
        assert!(!PackageReference::new("/opt/operators/zk").is_relative());
    }
}
