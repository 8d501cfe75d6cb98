// src/resolver/walker.rs

//! Transitive dependency discovery
//!
//! The walker visits `Operator` tasks depth-first in declaration order,
//! resolving each referenced package once per identity. Every discovered
//! package becomes a graph vertex; every reference becomes an edge, and the
//! walk aborts as soon as an edge closes a cycle. Task references are
//! rewritten to the resolved identity so later stages need not resolve again.
//!
//! The walk keeps an explicit stack of frames instead of recursing, so deep
//! dependency chains do not grow the call stack.

use super::graph::DependencyGraph;
use super::PackageResolver;
use crate::error::{Error, Result};
use crate::package::{Package, PackageId, PackageReference};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// A resolved dependency
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The resolved package, with its own task references rewritten
    pub package: Package,
    /// The reference string that first led to this package
    pub package_name: String,
    /// Base directory for the package's relative references
    pub scope: Option<PathBuf>,
}

impl Dependency {
    pub fn id(&self) -> PackageId {
        self.package.id()
    }
}

/// Outcome of a dependency walk
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Dependencies in discovery order, root excluded
    pub dependencies: Vec<Dependency>,
    /// Vertex 0 is the root; vertex `i` is `dependencies[i - 1]`
    graph: DependencyGraph,
}

impl Resolution {
    /// Dependencies ordered so each one precedes every package that depends on it
    pub fn install_order(&self) -> Vec<&Dependency> {
        // A successful walk never leaves a cycle behind
        let order = self.graph.topological_order().unwrap_or_default();
        order
            .into_iter()
            .filter(|&v| v != 0)
            .map(|v| &self.dependencies[v - 1])
            .collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// One package tracked during the walk
struct Node {
    package: Package,
    package_name: String,
    scope: Option<PathBuf>,
}

/// Walks the dependency tree of a package through a resolver
pub struct DependencyWalker<'r> {
    resolver: &'r dyn PackageResolver,
}

impl<'r> DependencyWalker<'r> {
    pub fn new(resolver: &'r dyn PackageResolver) -> Self {
        Self { resolver }
    }

    /// Resolve all transitive dependencies of `root`
    ///
    /// `scope` is the directory the root package was loaded from, if any;
    /// relative dependency references are only allowed below a scope.
    /// On success the root's own task references are rewritten in place; on
    /// error `root` is left untouched and no partial result is returned.
    pub fn walk(&self, root: &mut Package, scope: Option<&Path>) -> Result<Resolution> {
        let mut nodes = vec![Node {
            package: root.clone(),
            package_name: root.name.clone(),
            scope: scope.map(Path::to_path_buf),
        }];
        let mut index: HashMap<PackageId, usize> = HashMap::from([(root.id(), 0)]);
        let mut graph = DependencyGraph::new();
        graph.add_vertex();

        // (vertex, position of the next task to inspect)
        let mut stack: Vec<(usize, usize)> = vec![(0, 0)];

        while let Some(frame) = stack.last_mut() {
            let (parent, position) = *frame;

            let next = nodes[parent]
                .package
                .dependency_tasks()
                .find(|(i, _)| *i >= position)
                .map(|(i, reference)| (i, reference.clone()));

            let Some((task_index, reference)) = next else {
                stack.pop();
                continue;
            };
            frame.1 = task_index + 1;

            let parent_name = nodes[parent].package.fully_qualified_name();
            let lookup = lookup_name(&reference, nodes[parent].scope.as_deref(), &parent_name)?;

            let resolved = self
                .resolver
                .resolve(&lookup, &reference.app_version, &reference.operator_version)
                .map_err(|e| Error::ResolutionFailure {
                    dependency: reference.fully_qualified_name(),
                    parent: parent_name.clone(),
                    reason: e.to_string(),
                })?;

            let child_id = resolved.package.id();
            let (child, is_new) = match index.get(&child_id) {
                Some(&existing) => (existing, false),
                None => {
                    debug!("Adding new dependency {}", child_id);
                    let vertex = graph.add_vertex();
                    let child_scope = resolved
                        .scope
                        .clone()
                        .or_else(|| reference.is_relative().then(|| PathBuf::from(&lookup)));
                    nodes.push(Node {
                        package: resolved.package,
                        package_name: reference.package.clone(),
                        scope: child_scope,
                    });
                    index.insert(child_id.clone(), vertex);
                    (vertex, true)
                }
            };

            if !graph.add_edge_checked(parent, child) {
                warn!("Dependency cycle: {} -> {}", parent_name, child_id);
                return Err(Error::CycleDetected {
                    from: parent_name,
                    to: child_id.fully_qualified_name(),
                });
            }

            if let Some(task_ref) = nodes[parent].package.tasks[task_index].package.as_mut() {
                *task_ref = PackageReference::new(&child_id.name)
                    .with_versions(&child_id.app_version, &child_id.version);
            }

            if is_new {
                stack.push((child, 0));
            }
        }

        let mut nodes = nodes.into_iter();
        if let Some(walked_root) = nodes.next() {
            *root = walked_root.package;
        }

        let dependencies = nodes
            .map(|node| Dependency {
                package: node.package,
                package_name: node.package_name,
                scope: node.scope,
            })
            .collect();

        Ok(Resolution {
            dependencies,
            graph,
        })
    }
}

/// Resolve all transitive dependencies of `root`, excluding `root` itself
pub fn resolve(root: &mut Package, resolver: &dyn PackageResolver) -> Result<Vec<Dependency>> {
    Ok(DependencyWalker::new(resolver).walk(root, None)?.dependencies)
}

/// Name to hand to the resolver for a reference inside a parent package
fn lookup_name(reference: &PackageReference, parent_scope: Option<&Path>, parent_name: &str) -> Result<String> {
    if !reference.is_relative() {
        return Ok(reference.package.clone());
    }

    let base = parent_scope.ok_or_else(|| Error::InvalidDependencyPath {
        dependency: reference.fully_qualified_name(),
        parent: parent_name.to_string(),
        reason: format!(
            "a dependency with a relative path {:?} is only allowed in a package loaded from a local directory",
            reference.package
        ),
    })?;

    let joined = normalize(&base.join(&reference.package)).ok_or_else(|| Error::InvalidDependencyPath {
        dependency: reference.fully_qualified_name(),
        parent: parent_name.to_string(),
        reason: format!("{:?} escapes the filesystem root", reference.package),
    })?;

    Ok(joined.to_string_lossy().into_owned())
}

/// Lexically resolve `.` and `..` components
///
/// Relative paths may climb above their first component; only an absolute
/// path climbing above its root is rejected.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => return None,
                _ => out.push(Component::ParentDir),
            },
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::CatalogResolver;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/ops/kafka/../zookeeper")),
            Some(PathBuf::from("/ops/zookeeper"))
        );
        assert_eq!(
            normalize(Path::new("/ops/kafka/./deps/zk")),
            Some(PathBuf::from("/ops/kafka/deps/zk"))
        );
        assert_eq!(normalize(Path::new("/ops/../../zk")), None);
    }

    #[test]
    fn test_normalize_relative_scope() {
        assert_eq!(normalize(Path::new("ops/kafka/../../zk")), Some(PathBuf::from("zk")));
        assert_eq!(normalize(Path::new("ops/../../zk")), Some(PathBuf::from("../zk")));
        assert_eq!(normalize(Path::new("./kafka/./zk")), Some(PathBuf::from("kafka/zk")));
    }

    #[test]
    fn test_no_dependencies() {
        let catalog = CatalogResolver::new();
        let mut root = Package::new("redis", "0.1.0");

        let deps = resolve(&mut root, &catalog).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn test_relative_reference_without_scope_fails() {
        let catalog = CatalogResolver::new().with_at("/ops/zk", Package::new("zookeeper", "0.3.0"));
        let mut root = Package::new("kafka", "1.0.0").depends_on(PackageReference::new("../zk"));

        match resolve(&mut root, &catalog) {
            Err(Error::InvalidDependencyPath { parent, .. }) => assert_eq!(parent, "kafka-1.0.0"),
            other => panic!("expected InvalidDependencyPath, got {:?}", other),
        }
    }

    #[test]
    fn test_relative_reference_resolves_against_scope() {
        let mut catalog = CatalogResolver::new();
        catalog.add_at("/ops/zk", Package::new("zookeeper", "0.3.0"));
        // zookeeper 0.4.0 refers to a package relative to its own directory
        catalog.add_at(
            "/ops/zk",
            Package::new("zookeeper", "0.4.0").depends_on(PackageReference::new("./deps/metrics")),
        );
        catalog.add_at("/ops/zk/deps/metrics", Package::new("metrics", "0.1.0"));

        let mut root = Package::new("kafka", "1.0.0")
            .depends_on(PackageReference::new("../zk").with_versions("", "0.4.0"));

        let resolution = DependencyWalker::new(&catalog)
            .walk(&mut root, Some(Path::new("/ops/kafka")))
            .unwrap();

        let names: Vec<_> = resolution.dependencies.iter().map(|d| d.package.name.as_str()).collect();
        assert_eq!(names, vec!["zookeeper", "metrics"]);
        assert_eq!(resolution.dependencies[0].package_name, "../zk");
        assert_eq!(resolution.dependencies[0].scope, Some(PathBuf::from("/ops/zk")));

        // Root reference rewritten to the resolved identity
        let (_, reference) = root.dependency_tasks().next().unwrap();
        assert_eq!(reference.package, "zookeeper");
        assert_eq!(reference.operator_version, "0.4.0");
    }

    #[test]
    fn test_relative_scope_climbs_to_sibling() {
        let catalog = CatalogResolver::new().with_at("zk", Package::new("zookeeper", "0.3.0"));
        let mut root = Package::new("kafka", "1.0.0").depends_on(PackageReference::new("../../zk"));

        let resolution = DependencyWalker::new(&catalog)
            .walk(&mut root, Some(Path::new("ops/kafka")))
            .unwrap();

        assert_eq!(resolution.dependencies[0].package.name, "zookeeper");
        assert_eq!(resolution.dependencies[0].scope, Some(PathBuf::from("zk")));
    }
}
