// src/commands/deps.rs
//! Dependency resolution command

use super::open_catalog;
use anyhow::Result;
use opkit::resolver::{DependencyWalker, PackageResolver};
use opkit::OpkitConfig;
use tracing::info;

/// Resolve a package and print its dependencies in install order
pub fn cmd_deps(
    package: &str,
    app_version: Option<&str>,
    version: Option<&str>,
    catalog: Option<&str>,
    config: &OpkitConfig,
) -> Result<()> {
    let catalog = open_catalog(catalog, config)?;
    let resolved = catalog.resolve(package, app_version.unwrap_or(""), version.unwrap_or(""))?;
    let mut root = resolved.package;
    info!("Resolving dependencies of {}", root.fully_qualified_name());

    let resolution = DependencyWalker::new(&catalog).walk(&mut root, resolved.scope.as_deref())?;

    if resolution.is_empty() {
        println!("{} has no dependencies.", root.fully_qualified_name());
        return Ok(());
    }

    println!("Install order for {}:", root.fully_qualified_name());
    for (i, dep) in resolution.install_order().iter().enumerate() {
        if dep.package_name == dep.package.name {
            println!("  {}. {}", i + 1, dep.id());
        } else {
            println!("  {}. {} (from {})", i + 1, dep.id(), dep.package_name);
        }
    }
    println!("\nTotal: {} package(s)", resolution.dependencies.len());

    Ok(())
}
