// src/instance/lifecycle.rs

//! Plan run lifecycle on an instance
//!
//! Status trees are built from the plan definitions of the bound package
//! version, reset when a plan starts, and replaced by whatever the executor
//! reports while the plan runs.

use super::snapshot::SnapshotStore;
use super::status::{ExecutionStatus, PhaseStatus, PlanStatus, StepStatus};
use super::Instance;
use crate::error::{Error, Result};
use crate::package::{DEPLOY_PLAN, Package, UPGRADE_PLAN};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reconcile the instance's status trees with the package's plan definitions
///
/// Plans, phases and steps that are new get a `NEVER_RUN` entry. Those that
/// existed before keep their status and message, and a plan keeps its run
/// identifier and timestamp. Status entries of plans the package no longer
/// defines are left alone. The aggregated status is never touched.
pub fn ensure_plan_status_initialized(instance: &mut Instance, package: &Package) {
    for (plan_name, plan) in &package.plans {
        let previous = instance.status.plan_status.get(plan_name);
        let mut plan_status = PlanStatus::new(plan_name);

        if let Some(prev) = previous {
            plan_status.set_with_message(prev.status, prev.message.clone());
            plan_status.uid = prev.uid.clone();
            plan_status.last_updated = prev.last_updated;
        }

        for phase in &plan.phases {
            let prev_phase = previous.and_then(|p| p.phase(&phase.name));
            let mut phase_status = PhaseStatus::new(&phase.name);
            if let Some(prev) = prev_phase {
                phase_status.set_with_message(prev.status, prev.message.clone());
            }

            for step in &phase.steps {
                let mut step_status = StepStatus::new(&step.name);
                if let Some(prev) = prev_phase.and_then(|p| p.step(&step.name)) {
                    step_status.set_with_message(prev.status, prev.message.clone());
                }
                phase_status.steps.push(step_status);
            }

            plan_status.phases.push(phase_status);
        }

        instance
            .status
            .plan_status
            .insert(plan_name.clone(), plan_status);
    }
}

/// Start a new run of a plan
///
/// The plan and everything beneath it goes to `PENDING` under a fresh run
/// identifier, the plan becomes the active one, and the current spec is
/// saved as the snapshot later decisions diff against.
pub fn start_plan_execution(
    instance: &mut Instance,
    plan_name: &str,
    package: &Package,
    store: &dyn SnapshotStore,
) -> Result<()> {
    if instance.no_plan_ever_executed() || plan_name == DEPLOY_PLAN || plan_name == UPGRADE_PLAN {
        ensure_plan_status_initialized(instance, package);
    }

    let instance_name = instance.qualified_name();
    let plan_status = instance
        .status
        .plan_status
        .get_mut(plan_name)
        .ok_or_else(|| Error::PlanNotFound {
            plan: plan_name.to_string(),
            context: format!("instance {}", instance_name),
        })?;

    plan_status.set_all(ExecutionStatus::Pending);
    plan_status.uid = new_run_id(&plan_status.uid);
    plan_status.last_updated = Some(Utc::now());
    debug!("Plan {} of {} starts run {}", plan_name, instance_name, plan_status.uid);

    instance.status.aggregated_status.status = ExecutionStatus::Pending;
    instance.status.aggregated_status.active_plan_name = plan_name.to_string();

    store.save_snapshot(instance)?;
    info!("Started execution of plan {} on instance {}", plan_name, instance_name);
    Ok(())
}

/// Apply a plan status reported by the executor
///
/// The reported tree replaces the stored one. The aggregated status follows
/// the plan and the active plan is released once the plan is terminal.
/// A report that breaks the transition table is logged as a warning and
/// applied anyway.
pub fn update_instance_status(instance: &mut Instance, mut plan_status: PlanStatus) -> Result<()> {
    let instance_name = instance.qualified_name();
    let Some(slot) = instance.status.plan_status.get_mut(&plan_status.name) else {
        return Err(Error::PlanNotFound {
            plan: plan_status.name,
            context: format!("status of instance {}", instance_name),
        });
    };

    if plan_status.last_updated.is_none() {
        plan_status.last_updated = Some(Utc::now());
    }

    let status = plan_status.status;
    let name = plan_status.name.clone();
    if !slot.status.can_transition_to(status) {
        warn!(
            "Plan {} on instance {} reported invalid status transition {} -> {}",
            name, instance_name, slot.status, status
        );
    }
    *slot = plan_status;

    let aggregated = &mut instance.status.aggregated_status;
    aggregated.status = status;
    if status.is_terminal() {
        info!("Plan {} on instance {} finished with status {}", name, instance_name, status);
        aggregated.active_plan_name.clear();
    }
    Ok(())
}

/// A run identifier that differs from the previous one
fn new_run_id(previous: &str) -> String {
    loop {
        let uid = Uuid::new_v4().to_string();
        if uid != previous {
            return uid;
        }
    }
}
