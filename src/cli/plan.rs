// src/cli/plan.rs
//! Rollout plan commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Show which plan would start next on an instance
    ///
    /// Compares the instance's desired state against the state its last
    /// plan ran with and prints the plan that must run, or "none".
    Next {
        /// Instance document (TOML, or JSON by extension)
        #[arg(short, long)]
        instance: String,

        /// Package catalog (overrides the configured one)
        #[arg(short, long)]
        catalog: Option<String>,
    },

    /// Start a plan on an instance and write the instance back
    Start {
        /// Instance document (TOML, or JSON by extension)
        #[arg(short, long)]
        instance: String,

        /// Plan to start
        #[arg(short, long)]
        plan: String,

        /// Package catalog (overrides the configured one)
        #[arg(short, long)]
        catalog: Option<String>,
    },

    /// Run one reconciliation pass and write the instance back
    ///
    /// Updates the cleanup finalizer and starts the next plan if one is due.
    Reconcile {
        /// Instance document (TOML, or JSON by extension)
        #[arg(short, long)]
        instance: String,

        /// Package catalog (overrides the configured one)
        #[arg(short, long)]
        catalog: Option<String>,
    },

    /// Print the plan/phase/step status tree of an instance
    Status {
        /// Instance document (TOML, or JSON by extension)
        #[arg(short, long)]
        instance: String,
    },
}
