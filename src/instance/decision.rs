// src/instance/decision.rs

//! Choosing the plan an instance must run next
//!
//! The decision is a cascade over the instance's state, each stage
//! short-circuiting the rest:
//!
//! 1. A deleting instance runs its cleanup plan once
//! 2. A running plan is never interrupted
//! 3. An instance that never ran anything deploys
//! 4. A changed package version upgrades
//! 5. Changed parameters run the plan their definitions trigger
//!
//! Deciding has no side effects; committing to the result is a separate
//! [`start_plan_execution`](super::start_plan_execution) call.

use super::snapshot::SnapshotStore;
use super::Instance;
use crate::error::{Error, Result};
use crate::package::{
    CLEANUP_PLAN, DEPLOY_PLAN, Package, UPDATE_PLAN, UPGRADE_PLAN, parameter_definitions,
    parameter_diff,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Plans tried, in order, when the package version changes
const UPGRADE_CHAIN: &[&str] = &[UPGRADE_PLAN, UPDATE_PLAN, DEPLOY_PLAN];

/// Plans tried, in order, when parameters without a trigger change
const UPDATE_CHAIN: &[&str] = &[UPDATE_PLAN, DEPLOY_PLAN];

/// Decide which plan, if any, must start on this instance
pub fn plan_to_be_executed(
    instance: &Instance,
    package: &Package,
    store: &dyn SnapshotStore,
) -> Result<Option<String>> {
    let name = instance.qualified_name();

    if instance.is_deleting() {
        info!("Instance {} is being deleted", name);
        if package.has_cleanup_plan()
            && let Some(cleanup) = instance.plan_status(CLEANUP_PLAN)
        {
            if cleanup.status.is_finished() {
                debug!("Cleanup of {} already finished", name);
                return Ok(None);
            }
            if !cleanup.status.is_running() {
                info!("Scheduling cleanup plan on instance {}", name);
                return Ok(Some(CLEANUP_PLAN.to_string()));
            }
            // Running cleanup is caught by the check below
        }
    }

    if let Some(running) = instance.plan_in_progress() {
        debug!("Plan {} is running on {}, nothing to start", running.name, name);
        return Ok(None);
    }

    if instance.no_plan_ever_executed() {
        info!("No plan ever ran on instance {}, deploying", name);
        return Ok(Some(DEPLOY_PLAN.to_string()));
    }

    let snapshot = store.load_snapshot(instance)?.ok_or_else(|| {
        Error::InconsistentState(format!(
            "instance {} has executed plans but no snapshot of the applied state",
            name
        ))
    })?;

    if snapshot.package_version.name != instance.spec.package_version.name {
        info!(
            "Upgrade of instance {} detected: {} -> {}",
            name, snapshot.package_version.name, instance.spec.package_version.name
        );
        return package
            .select_plan(UPGRADE_CHAIN)
            .map(Some)
            .ok_or_else(|| plan_chain_missing(UPGRADE_CHAIN, package));
    }

    let diff = parameter_diff(&snapshot.parameters, &instance.spec.parameters);
    if diff.is_empty() {
        return Ok(None);
    }

    let changed: Vec<&str> = diff.keys().map(String::as_str).collect();
    info!("Parameters changed on instance {}: {:?}", name, changed);

    match triggered_plan(&diff, package)? {
        Some(plan) => {
            info!("Parameter change on {} triggers plan {}", name, plan);
            Ok(Some(plan))
        }
        None => package
            .select_plan(UPDATE_CHAIN)
            .map(Some)
            .ok_or_else(|| plan_chain_missing(UPDATE_CHAIN, package)),
    }
}

/// The single plan triggered by the changed parameters
///
/// Parameters are visited in name order. Equal triggers collapse; two
/// distinct triggers are ambiguous.
fn triggered_plan(
    diff: &std::collections::BTreeMap<String, String>,
    package: &Package,
) -> Result<Option<String>> {
    let triggers: BTreeSet<&str> = parameter_definitions(diff, package)
        .into_iter()
        .map(|p| p.trigger.as_str())
        .filter(|t| !t.is_empty())
        .collect();

    if triggers.len() > 1 {
        return Err(Error::AmbiguousTrigger {
            plans: triggers.into_iter().map(String::from).collect(),
        });
    }

    match triggers.into_iter().next() {
        Some(plan) if package.has_plan(plan) => Ok(Some(plan.to_string())),
        Some(plan) => Err(Error::PlanNotFound {
            plan: plan.to_string(),
            context: format!("triggered by a parameter change on {}", package.fully_qualified_name()),
        }),
        None => Ok(None),
    }
}

fn plan_chain_missing(chain: &[&str], package: &Package) -> Error {
    Error::PlanNotFound {
        plan: chain.join(" | "),
        context: format!("none defined by {}", package.fully_qualified_name()),
    }
}
