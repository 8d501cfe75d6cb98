// src/resolver/mod.rs

//! Package resolution and dependency walking
//!
//! A [`PackageResolver`] turns a package reference into a materialized
//! [`Package`]. The [`walker`] follows `Operator` tasks through resolvers to
//! discover every transitive dependency of a package, using a
//! [`graph::DependencyGraph`] to reject cycles before anything is installed.
//!
//! Resolvers backed by the filesystem, tarballs, URLs or a cluster live
//! outside this crate; [`CatalogResolver`] is an in-memory implementation
//! that can also be loaded from a catalog file.

pub mod graph;
pub mod walker;

pub use graph::DependencyGraph;
pub use walker::{Dependency, DependencyWalker, Resolution, resolve};

use crate::error::{Error, Result};
use crate::package::{Package, fully_qualified_name};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A package returned by a resolver
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub package: Package,
    /// Base directory for relative dependency references of this package
    pub scope: Option<PathBuf>,
}

impl ResolvedPackage {
    pub fn new(package: Package) -> Self {
        Self {
            package,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<PathBuf>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Source of package descriptions
///
/// Empty version arguments mean "any"; implementations pick the newest match.
pub trait PackageResolver {
    fn resolve(&self, name: &str, app_version: &str, operator_version: &str) -> Result<ResolvedPackage>;
}

/// Compare two version strings, semantically when both parse as semver
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb),
        _ => a.cmp(b),
    }
}

/// One catalog file entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    /// Register the package under this directory instead of its name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(flatten)]
    package: Package,
}

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    packages: Vec<CatalogEntry>,
}

/// In-memory package catalog
///
/// Packages are registered under their name, or under an absolute directory
/// path. Path-registered packages carry that path as their resolver scope so
/// their own `./` and `../` dependencies resolve next to them.
#[derive(Debug, Clone, Default)]
pub struct CatalogResolver {
    /// Lookup key -> available versions
    entries: BTreeMap<String, Vec<Package>>,
    /// Lookup keys that are directories
    scoped: BTreeMap<String, PathBuf>,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package under its own name
    pub fn add(&mut self, package: Package) {
        self.entries.entry(package.name.clone()).or_default().push(package);
    }

    /// Register a package under a directory path
    pub fn add_at(&mut self, path: impl AsRef<Path>, package: Package) {
        let path = path.as_ref().to_path_buf();
        let key = path.to_string_lossy().into_owned();
        self.scoped.insert(key.clone(), path);
        self.entries.entry(key).or_default().push(package);
    }

    pub fn with(mut self, package: Package) -> Self {
        self.add(package);
        self
    }

    pub fn with_at(mut self, path: impl AsRef<Path>, package: Package) -> Self {
        self.add_at(path, package);
        self
    }

    /// Number of registered package versions
    pub fn len(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a package version by its fully qualified name
    pub fn package_version(&self, fqn: &str) -> Result<&Package> {
        self.entries
            .values()
            .flatten()
            .find(|p| p.fully_qualified_name() == fqn)
            .ok_or_else(|| Error::PackageNotFound(fqn.to_string()))
    }

    /// Load a catalog from a TOML file, or JSON when the extension is `.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        let mut catalog = Self::new();
        for entry in file.packages {
            if entry.package.version.is_empty() {
                return Err(Error::InvalidVersion(format!(
                    "package {} in {} has no version",
                    entry.package.name,
                    path.display()
                )));
            }
            match entry.path {
                Some(dir) => catalog.add_at(dir, entry.package),
                None => catalog.add(entry.package),
            }
        }
        debug!("Loaded {} package versions from {}", catalog.len(), path.display());
        Ok(catalog)
    }
}

impl PackageResolver for CatalogResolver {
    fn resolve(&self, name: &str, app_version: &str, operator_version: &str) -> Result<ResolvedPackage> {
        let not_found = || Error::PackageNotFound(fully_qualified_name(name, app_version, operator_version));

        let candidates = self.entries.get(name).ok_or_else(not_found)?;
        let package = candidates
            .iter()
            .filter(|p| app_version.is_empty() || p.app_version == app_version)
            .filter(|p| operator_version.is_empty() || p.version == operator_version)
            .max_by(|a, b| {
                compare_versions(&a.version, &b.version)
                    .then_with(|| compare_versions(&a.app_version, &b.app_version))
            })
            .ok_or_else(not_found)?;

        let resolved = ResolvedPackage::new(package.clone());
        Ok(match self.scoped.get(name) {
            Some(dir) => resolved.with_scope(dir.clone()),
            None => resolved,
        })
    }
}
