use crate::planner::ExecutionModel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod dispatch;

pub use dispatch::dispatch;

/// `Planforge` - build, validate and execute capability plans.
#[derive(Parser, Debug)]
#[command(name = "planforge")]
#[command(version = "0.1.0")]
#[command(about = "Build, validate and execute capability plans.", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.planforge/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the keyword-based plan for a message, without calling a model
    Simple {
        /// The user message to plan for
        message: String,

        /// Capabilities to chain instead of the keyword rules (repeatable)
        #[arg(long = "capability")]
        capabilities: Vec<String>,
    },

    /// Check a plan file and print the validation report
    Validate {
        /// Path to a plan in JSON
        plan: PathBuf,
    },

    /// Validate and execute a plan file with the built-in capabilities
    Run {
        /// Path to a plan in JSON
        plan: PathBuf,

        /// Message made available to capabilities as the request message
        #[arg(short, long)]
        message: Option<String>,

        /// Execute even when validation reports errors
        #[arg(long)]
        force: bool,

        /// On failure, ask the model to replan the remaining steps and run once more
        #[arg(long)]
        adapt: bool,
    },

    /// Ask the configured model for a plan
    Generate {
        /// Goal to plan for
        #[arg(short, long)]
        goal: String,

        /// Preferred execution model (sequential, parallel, dag)
        #[arg(long = "model-exec")]
        execution_model: Option<ExecutionModel>,

        /// Constraint passed to the model (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<String>,

        /// Execute the generated plan after printing it
        #[arg(long)]
        run: bool,
    },
}
