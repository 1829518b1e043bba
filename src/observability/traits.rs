use crate::planner::{ExecutionModel, PlanStatus};
use std::time::Duration;

/// Why a step produced neither a result nor an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The capability's `validate` returned false
    Validation,
    /// The handler returned no outcome
    Handler,
    /// The step failed and its retry policy says `on_error = skip`
    Policy,
}

/// Events emitted while a plan executes
#[derive(Debug, Clone)]
pub enum PlanEvent {
    PlanStarted {
        plan_id: String,
        model: ExecutionModel,
        total_steps: usize,
    },
    WaveStarted {
        plan_id: String,
        wave: usize,
        step_ids: Vec<String>,
    },
    StepStarted {
        plan_id: String,
        step_id: String,
        capability: String,
    },
    StepRetry {
        plan_id: String,
        step_id: String,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    StepCompleted {
        plan_id: String,
        step_id: String,
        capability: String,
        duration: Duration,
    },
    StepSkipped {
        plan_id: String,
        step_id: String,
        reason: SkipReason,
    },
    StepFailed {
        plan_id: String,
        step_id: String,
        error: String,
    },
    PlanCancelled {
        plan_id: String,
    },
    PlanFinished {
        plan_id: String,
        status: PlanStatus,
        duration: Duration,
    },
}

/// Receives execution events; this is the callback of `execute_plan`.
pub trait PlanObserver: Send + Sync {
    fn on_event(&self, event: &PlanEvent);

    /// Human-readable name of this observer
    fn name(&self) -> &str;
}
