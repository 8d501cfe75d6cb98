// src/error.rs

//! Error types for opkit

use thiserror::Error;

/// Result type alias using opkit's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by dependency resolution and rollout decisions
#[derive(Error, Debug)]
pub enum Error {
    /// A referenced dependency could not be resolved
    #[error("failed to resolve package {dependency}, dependency of package {parent}: {reason}")]
    ResolutionFailure {
        dependency: String,
        parent: String,
        reason: String,
    },

    /// Adding a dependency edge would close a cycle
    #[error("cyclic package dependency found when adding package {from} -> {to}")]
    CycleDetected { from: String, to: String },

    /// A relative dependency reference cannot be scoped
    #[error("dependency {dependency} of package {parent} has an invalid path: {reason}")]
    InvalidDependencyPath {
        dependency: String,
        parent: String,
        reason: String,
    },

    /// Package lookup in a resolver found nothing
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// A plan required by an explicit request or a fallback chain is missing
    #[error("plan not found: {plan} ({context})")]
    PlanNotFound { plan: String, context: String },

    /// A parameter change implies more than one plan
    #[error("triggering multiple plans at once is not allowed: [{}]", plans.join(", "))]
    AmbiguousTrigger { plans: Vec<String> },

    /// Persisted instance state contradicts its execution history
    #[error("unexpected state: {0}")]
    InconsistentState(String),

    /// Parameter value failed validation
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An immutable parameter was changed
    #[error("parameter '{name}' is immutable but was changed from '{old}' to '{new}'")]
    ImmutableParameter {
        name: String,
        old: String,
        new: String,
    },

    /// Version string could not be interpreted
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Snapshot or document (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration or catalog file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigError(#[from] toml::de::Error),

    /// A document could not be written as TOML
    #[error("failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short reason name attached to warning events for this error
    pub fn event_name(&self) -> &'static str {
        match self {
            Error::ResolutionFailure { .. } | Error::PackageNotFound(_) => "ResolutionFailure",
            Error::CycleDetected { .. } => "CycleDetected",
            Error::InvalidDependencyPath { .. } => "InvalidDependencyPath",
            Error::PlanNotFound { .. } => "PlanNotFound",
            Error::AmbiguousTrigger { .. } => "AmbiguousTrigger",
            Error::InconsistentState(_) => "UnexpectedState",
            Error::InvalidParameter(_) | Error::ImmutableParameter { .. } => "InvalidParameter",
            Error::InvalidVersion(_) => "InvalidVersion",
            Error::Serialization(_) | Error::ConfigError(_) | Error::TomlWrite(_) | Error::Io(_) => {
                "InternalError"
            },
        }
    }

    /// Whether this error indicates corrupted state rather than a user mistake
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InconsistentState(_))
    }
}
