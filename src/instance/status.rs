// src/instance/status.rs

//! Execution status of plans, phases and steps
//!
//! # Status Lifecycle
//!
//! ```text
//! NEVER_RUN -> PENDING -> IN_PROGRESS -> COMPLETE
//!                 ^  \        ^  |
//!                 |   v       |  v
//!                 +-- ERROR --+
//!                       |
//!                       v
//!                  FATAL_ERROR
//! ```
//!
//! A new run of a plan resets its whole tree to `PENDING`; that reset is
//! not a transition in the table above.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution state of a plan, phase or step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    NeverRun,
    Pending,
    InProgress,
    Error,
    Complete,
    FatalError,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::NeverRun => "NEVER_RUN",
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::InProgress => "IN_PROGRESS",
            ExecutionStatus::Error => "ERROR",
            ExecutionStatus::Complete => "COMPLETE",
            ExecutionStatus::FatalError => "FATAL_ERROR",
        }
    }

    /// Scheduled or executing, including retryable errors
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Pending | ExecutionStatus::InProgress | ExecutionStatus::Error
        )
    }

    /// No further transitions happen without a new run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Complete | ExecutionStatus::FatalError)
    }

    /// Terminated successfully
    pub fn is_finished(&self) -> bool {
        matches!(self, ExecutionStatus::Complete)
    }

    /// Whether moving from `self` to `next` is valid within one run
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;

        if *self == next {
            return true;
        }
        matches!(
            (*self, next),
            (NeverRun, Pending)
                | (Pending, InProgress)
                | (Pending, Error)
                | (InProgress, Complete)
                | (InProgress, Error)
                | (Error, InProgress)
                | (Error, Pending)
                | (Error, FatalError)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NEVER_RUN" => Ok(ExecutionStatus::NeverRun),
            "PENDING" => Ok(ExecutionStatus::Pending),
            "IN_PROGRESS" => Ok(ExecutionStatus::InProgress),
            "ERROR" => Ok(ExecutionStatus::Error),
            "COMPLETE" => Ok(ExecutionStatus::Complete),
            "FATAL_ERROR" => Ok(ExecutionStatus::FatalError),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

/// Status of one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub name: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Status of one phase and its steps, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub name: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub steps: Vec<StepStatus>,
}

/// Status of one plan and its phases, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    pub name: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Identifier of the current run; empty if the plan never ran
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phases: Vec<PhaseStatus>,
}

macro_rules! impl_set_status {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                /// Set the status and clear the message
                pub fn set(&mut self, status: ExecutionStatus) {
                    self.status = status;
                    self.message.clear();
                }

                pub fn set_with_message(&mut self, status: ExecutionStatus, message: impl Into<String>) {
                    self.status = status;
                    self.message = message.into();
                }
            }
        )*
    };
}

impl_set_status!(StepStatus, PhaseStatus, PlanStatus);

impl StepStatus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl PhaseStatus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.name == name)
    }
}

impl PlanStatus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseStatus> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn phase_mut(&mut self, name: &str) -> Option<&mut PhaseStatus> {
        self.phases.iter_mut().find(|p| p.name == name)
    }

    /// Set this plan and everything beneath it to one status
    pub fn set_all(&mut self, status: ExecutionStatus) {
        self.set(status);
        for phase in &mut self.phases {
            phase.set(status);
            for step in &mut phase.steps {
                step.set(status);
            }
        }
    }
}

/// One-line summary of an instance's rollout state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStatus {
    pub status: ExecutionStatus,
    /// Plan currently scheduled or running; empty when idle
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active_plan_name: String,
}

impl AggregatedStatus {
    pub fn active_plan(&self) -> Option<&str> {
        (!self.active_plan_name.is_empty()).then_some(self.active_plan_name.as_str())
    }
}
