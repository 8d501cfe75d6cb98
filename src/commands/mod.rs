// src/commands/mod.rs
//! Command handlers for the opkit CLI

mod deps;
mod plan;

pub use deps::cmd_deps;
pub use plan::{cmd_plan_next, cmd_plan_reconcile, cmd_plan_start, cmd_plan_status};

use anyhow::{Context, Result};
use opkit::{CatalogResolver, OpkitConfig};
use std::path::Path;

/// Load the catalog given on the command line, or the configured one
pub(crate) fn open_catalog(catalog: Option<&str>, config: &OpkitConfig) -> Result<CatalogResolver> {
    let path = catalog.map(Path::new).unwrap_or(&config.catalog);
    CatalogResolver::from_file(path)
        .with_context(|| format!("Failed to load package catalog {}", path.display()))
}
