// src/config.rs

//! Configuration file for opkit
//!
//! ```toml
//! log_level = "debug"
//! catalog = "/srv/operators/catalog.toml"
//! snapshot_annotation = "opkit.dev/last-applied-instance-state"
//! cleanup_finalizer = "opkit.dev.instance.cleanup"
//! ```

use crate::error::Result;
use crate::instance::CLEANUP_FINALIZER;
use crate::instance::snapshot::SNAPSHOT_ANNOTATION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opkit/config.toml";

/// Default location of the package catalog
pub const DEFAULT_CATALOG_PATH: &str = "/var/lib/opkit/catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpkitConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Package catalog file (TOML, or JSON by extension)
    pub catalog: PathBuf,
    /// Instance annotation holding the last applied spec
    pub snapshot_annotation: String,
    /// Finalizer guarding instance deletion until cleanup ran
    pub cleanup_finalizer: String,
}

impl Default for OpkitConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            catalog: PathBuf::from(DEFAULT_CATALOG_PATH),
            snapshot_annotation: SNAPSHOT_ANNOTATION.to_string(),
            cleanup_finalizer: CLEANUP_FINALIZER.to_string(),
        }
    }
}

impl OpkitConfig {
    /// Load configuration from `path`, or the default location
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
