use super::traits::{PlanEvent, PlanObserver};
use tracing::{info, warn};

/// Writes plan events to `tracing` at info/warn level
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl PlanObserver for LogObserver {
    fn on_event(&self, event: &PlanEvent) {
        match event {
            PlanEvent::PlanStarted {
                plan_id,
                model,
                total_steps,
            } => {
                info!(plan_id = %plan_id, model = %model, total_steps, "plan.start");
            }
            PlanEvent::WaveStarted {
                plan_id,
                wave,
                step_ids,
            } => {
                info!(plan_id = %plan_id, wave, width = step_ids.len(), "wave.start");
            }
            PlanEvent::StepStarted {
                plan_id,
                step_id,
                capability,
            } => {
                info!(plan_id = %plan_id, step_id = %step_id, capability = %capability, "step.start");
            }
            PlanEvent::StepRetry {
                plan_id,
                step_id,
                attempt,
                delay,
                error,
            } => {
                warn!(
                    plan_id = %plan_id,
                    step_id = %step_id,
                    attempt,
                    delay_ms = millis(*delay),
                    error = %error,
                    "step.retry"
                );
            }
            PlanEvent::StepCompleted {
                plan_id,
                step_id,
                capability,
                duration,
            } => {
                info!(
                    plan_id = %plan_id,
                    step_id = %step_id,
                    capability = %capability,
                    duration_ms = millis(*duration),
                    "step.complete"
                );
            }
            PlanEvent::StepSkipped {
                plan_id,
                step_id,
                reason,
            } => {
                info!(plan_id = %plan_id, step_id = %step_id, reason = %reason, "step.skip");
            }
            PlanEvent::StepFailed {
                plan_id,
                step_id,
                error,
            } => {
                warn!(plan_id = %plan_id, step_id = %step_id, error = %error, "step.fail");
            }
            PlanEvent::PlanCancelled { plan_id } => {
                warn!(plan_id = %plan_id, "plan.cancel");
            }
            PlanEvent::PlanFinished {
                plan_id,
                status,
                duration,
            } => {
                info!(
                    plan_id = %plan_id,
                    status = %status,
                    duration_ms = millis(*duration),
                    "plan.finish"
                );
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
