// src/cli/mod.rs
//! CLI definitions for opkit
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `deps` - Resolve a package's dependencies and print the install order
//! - `plan` - Rollout decisions and plan status of an instance

use clap::{Parser, Subcommand};

mod plan;

pub use plan::PlanCommands;

#[derive(Parser)]
#[command(name = "opkit")]
#[command(author = "Opkit Contributors")]
#[command(version)]
#[command(about = "Operator package dependency resolution and rollout planning", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = opkit::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve all dependencies of a package and print the install order
    Deps {
        /// Package name, or directory path registered in the catalog
        package: String,

        /// Application version to resolve
        #[arg(long)]
        app_version: Option<String>,

        /// Operator package version to resolve
        #[arg(short, long)]
        version: Option<String>,

        /// Package catalog (overrides the configured one)
        #[arg(short, long)]
        catalog: Option<String>,
    },

    /// Rollout plans of an instance
    #[command(subcommand)]
    Plan(PlanCommands),
}
