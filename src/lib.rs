#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod planner;

pub use capabilities::{Capability, CapabilityRegistry, RequestContext};
pub use config::Config;
pub use error::{PlanError, Result};
pub use planner::{
    ExecutionModel, Plan, PlanAdapter, PlanBuilder, PlanExecutionResult, PlanExecutor,
    PlanRequest, PlanValidator, Step,
};
