// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, PlanCommands};
use opkit::OpkitConfig;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = OpkitConfig::load(Some(Path::new(&cli.config)))?;

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Deps {
            package,
            app_version,
            version,
            catalog,
        }) => commands::cmd_deps(
            &package,
            app_version.as_deref(),
            version.as_deref(),
            catalog.as_deref(),
            &config,
        ),

        Some(Commands::Plan(plan_cmd)) => match plan_cmd {
            PlanCommands::Next { instance, catalog } => {
                commands::cmd_plan_next(&instance, catalog.as_deref(), &config)
            }
            PlanCommands::Start {
                instance,
                plan,
                catalog,
            } => commands::cmd_plan_start(&instance, &plan, catalog.as_deref(), &config),
            PlanCommands::Reconcile { instance, catalog } => {
                commands::cmd_plan_reconcile(&instance, catalog.as_deref(), &config)
            }
            PlanCommands::Status { instance } => commands::cmd_plan_status(&instance),
        },

        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
