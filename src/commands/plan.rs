// src/commands/plan.rs
//! Rollout plan commands

use super::open_catalog;
use anyhow::{Context, Result};
use opkit::instance::{ExecutionStatus, Instance, Reconciler};
use opkit::{OpkitConfig, Package};
use tracing::info;

fn load_instance(path: &str) -> Result<Instance> {
    Instance::from_file(path).with_context(|| format!("Failed to load instance {}", path))
}

/// Look up the package version the instance is bound to
fn bound_package(instance: &Instance, catalog: Option<&str>, config: &OpkitConfig) -> Result<Package> {
    let catalog = open_catalog(catalog, config)?;
    let name = &instance.spec.package_version.name;
    let package = catalog
        .package_version(name)
        .with_context(|| format!("Instance {} is bound to an unknown package version", instance.qualified_name()))?;
    Ok(package.clone())
}

/// Print the plan that would start next
pub fn cmd_plan_next(instance_path: &str, catalog: Option<&str>, config: &OpkitConfig) -> Result<()> {
    let instance = load_instance(instance_path)?;
    let package = bound_package(&instance, catalog, config)?;

    match Reconciler::from_config(config).next_plan(&instance, &package)? {
        Some(plan) => println!("{}", plan),
        None => println!("none"),
    }
    Ok(())
}

/// Start a plan and write the instance back
pub fn cmd_plan_start(instance_path: &str, plan: &str, catalog: Option<&str>, config: &OpkitConfig) -> Result<()> {
    let mut instance = load_instance(instance_path)?;
    let package = bound_package(&instance, catalog, config)?;

    Reconciler::from_config(config).start(&mut instance, plan, &package)?;
    instance.write_to_file(instance_path)?;

    let uid = instance.plan_status(plan).map(|p| p.uid.as_str()).unwrap_or_default();
    println!("Started plan '{}' on {} (run {})", plan, instance.qualified_name(), uid);
    Ok(())
}

/// Run one reconciliation pass and write the instance back
pub fn cmd_plan_reconcile(instance_path: &str, catalog: Option<&str>, config: &OpkitConfig) -> Result<()> {
    let mut instance = load_instance(instance_path)?;
    let package = bound_package(&instance, catalog, config)?;

    let outcome = Reconciler::from_config(config).reconcile(&mut instance, &package)?;
    instance.write_to_file(instance_path)?;
    info!("Reconciled instance {}", instance.qualified_name());

    if outcome.finalizer_added {
        println!("Added finalizer {}", config.cleanup_finalizer);
    }
    match &outcome.started {
        Some(plan) => println!("Started plan '{}'", plan),
        None => println!("No plan started"),
    }
    if outcome.finalizer_removed {
        println!("Removed finalizer {}", config.cleanup_finalizer);
    }
    Ok(())
}

/// Print the status tree of every plan
pub fn cmd_plan_status(instance_path: &str) -> Result<()> {
    let instance = load_instance(instance_path)?;
    let aggregated = &instance.status.aggregated_status;

    println!("Instance: {}", instance.qualified_name());
    println!("Package version: {}", instance.spec.package_version.name);
    match aggregated.active_plan() {
        Some(plan) => println!("Active plan: {} ({})", plan, aggregated.status),
        None => println!("Active plan: none"),
    }

    if instance.status.plan_status.is_empty() {
        println!("\nNo plan status recorded.");
        return Ok(());
    }

    let mut plans: Vec<_> = instance.status.plan_status.values().collect();
    plans.sort_by(|a, b| a.name.cmp(&b.name));

    for plan in plans {
        println!();
        print!("Plan {} [{}]", plan.name, plan.status);
        if let Some(at) = plan.last_updated {
            print!(" updated {}", at.format("%Y-%m-%d %H:%M:%S"));
        }
        println!();
        print_message(2, &plan.message);

        for phase in &plan.phases {
            println!("  Phase {} [{}]", phase.name, phase.status);
            print_message(4, &phase.message);
            for step in &phase.steps {
                let marker = match step.status {
                    ExecutionStatus::Complete => '+',
                    ExecutionStatus::Error | ExecutionStatus::FatalError => '!',
                    _ => '-',
                };
                println!("    {} {} [{}]", marker, step.name, step.status);
                print_message(6, &step.message);
            }
        }
    }
    Ok(())
}

fn print_message(indent: usize, message: &str) {
    if !message.is_empty() {
        println!("{:indent$}{}", "", message, indent = indent);
    }
}
