mod adapter;
mod builder;
mod executor;
mod parser;
mod types;
mod validator;

pub use adapter::{Adaptation, PlanAdapter};
pub use builder::{AssembledSteps, PlanBuilder, PlanPreferences, PlanRequest};
pub use executor::PlanExecutor;
pub use parser::{ParsedPlan, ParsedStep, PlanMarkupParser, PlanTextParser, extract_json};
pub use types::{
    ExecutionModel, ExecutionState, OnError, ParallelFailurePolicy, Plan, PlanExecutionResult,
    PlanStatus, RetryPolicy, Step, StepOutcome,
};
pub use validator::{PlanValidator, ValidationReport};
