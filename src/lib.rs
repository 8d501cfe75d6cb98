// src/lib.rs

//! opkit: operator package dependency resolution and rollout decisions
//!
//! Operator packages bundle an application with declarative rollout
//! workflows ("plans") and parameters. This crate holds the two engines
//! that sit under the install and reconcile paths:
//!
//! - Dependency resolution: discover, resolve and order the transitive
//!   package dependencies declared as tasks, rejecting cycles before
//!   anything is installed ([`resolver`])
//! - Rollout decisions: given an instance's applied and desired state,
//!   decide which plan runs next and track its plan/phase/step status
//!   ([`instance`])
//!
//! # Architecture
//!
//! - Resolvers, executors and the control-plane API are external; they
//!   plug in through [`resolver::PackageResolver`] and
//!   [`instance::SnapshotStore`]
//! - Everything is synchronous and single-writer per instance
//! - Errors are values; no retries happen inside the crate

pub mod config;
mod error;
pub mod instance;
pub mod package;
pub mod resolver;

pub use config::OpkitConfig;
pub use error::{Error, Result};
pub use instance::{
    AggregatedStatus, ExecutionStatus, Instance, PlanStatus, Reconciler, ensure_plan_status_initialized,
    plan_to_be_executed, start_plan_execution, update_instance_status,
};
pub use package::{Package, PackageId, PackageReference, Parameter};
pub use resolver::{CatalogResolver, Dependency, DependencyGraph, DependencyWalker, PackageResolver, resolve};
