// src/instance/snapshot.rs

//! Last applied instance spec
//!
//! Before a plan starts, the spec it runs against is serialized into the
//! instance's own metadata. The next decision diffs the current spec against
//! that copy to find out what changed since.

use super::{Instance, InstanceSpec};
use crate::error::Result;
use tracing::debug;

/// Annotation holding the last applied spec
pub const SNAPSHOT_ANNOTATION: &str = "opkit.dev/last-applied-instance-state";

/// Persistence of the last applied spec of an instance
pub trait SnapshotStore {
    /// Record the instance's current spec as its last applied state
    fn save_snapshot(&self, instance: &mut Instance) -> Result<()>;

    /// Read back the last applied spec, if one was ever saved
    fn load_snapshot(&self, instance: &Instance) -> Result<Option<InstanceSpec>>;
}

/// Keeps the snapshot as a JSON string in an instance annotation
#[derive(Debug, Clone)]
pub struct AnnotationSnapshotStore {
    annotation: String,
}

impl AnnotationSnapshotStore {
    pub fn new(annotation: &str) -> Self {
        Self {
            annotation: annotation.to_string(),
        }
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }
}

impl Default for AnnotationSnapshotStore {
    fn default() -> Self {
        Self::new(SNAPSHOT_ANNOTATION)
    }
}

impl SnapshotStore for AnnotationSnapshotStore {
    fn save_snapshot(&self, instance: &mut Instance) -> Result<()> {
        let snapshot = serde_json::to_string(&instance.spec)?;
        debug!(
            "Saving snapshot of instance {}: {}",
            instance.qualified_name(),
            snapshot
        );
        instance
            .metadata
            .annotations
            .insert(self.annotation.clone(), snapshot);
        Ok(())
    }

    fn load_snapshot(&self, instance: &Instance) -> Result<Option<InstanceSpec>> {
        match instance.metadata.annotations.get(&self.annotation) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}
