//! Per-step contract: resolve, validate, run with retries, record.

use crate::capabilities::{CapabilityContext, CapabilityIndex, RequestContext, WorkingMemory};
use crate::error::StepError;
use crate::observability::{PlanEvent, PlanObserver, SkipReason};
use crate::planner::types::{OnError, Step, StepOutcome};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What one step attempt sequence ended in.
#[derive(Debug)]
pub(super) enum StepRun {
    Completed(StepOutcome),
    Skipped(SkipReason),
    Failed(StepError),
}

/// How a finished step affects the rest of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Settled {
    Completed,
    Skipped,
    Failed { abort: bool },
}

/// Errors and skips gathered while a topology runs.
#[derive(Debug, Default)]
pub(super) struct Tally {
    pub errors: Vec<String>,
    pub skipped: Vec<String>,
}

/// State owned by one `execute_plan` call and shared by its steps.
pub(super) struct ExecutionScope<'a> {
    pub plan_id: String,
    pub index: CapabilityIndex,
    pub request: Arc<RequestContext>,
    pub working_memory: WorkingMemory,
    pub results: Mutex<Vec<StepOutcome>>,
    pub token: CancellationToken,
    pub observer: &'a dyn PlanObserver,
}

impl ExecutionScope<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn run_step(&self, step: &Step) -> StepRun {
        let Some(capability) = self.index.resolve(&step.capability_name).cloned() else {
            return StepRun::Failed(StepError::UnknownCapability {
                name: step.capability_name.clone(),
            });
        };

        self.observer.on_event(&PlanEvent::StepStarted {
            plan_id: self.plan_id.clone(),
            step_id: step.id.clone(),
            capability: capability.name().to_string(),
        });
        let started = Instant::now();

        let ctx = CapabilityContext {
            plan_id: self.plan_id.clone(),
            step_id: step.id.clone(),
            parameters: step.parameters.clone(),
            results: self.results.lock().await.clone(),
            request: Arc::clone(&self.request),
            working_memory: self.working_memory.clone(),
        };

        if !capability.validate(&ctx).await {
            return StepRun::Skipped(SkipReason::Validation);
        }

        let policy = &step.retry_policy;
        let mut attempt: u32 = 0;
        loop {
            match capability.handle(&ctx).await {
                Ok(Some(outcome)) => {
                    let outcome = StepOutcome {
                        step_id: step.id.clone(),
                        capability: capability.name().to_string(),
                        text: outcome.text,
                        data: outcome.data,
                        completed_at: Utc::now(),
                    };
                    self.results.lock().await.push(outcome.clone());
                    self.observer.on_event(&PlanEvent::StepCompleted {
                        plan_id: self.plan_id.clone(),
                        step_id: step.id.clone(),
                        capability: outcome.capability.clone(),
                        duration: started.elapsed(),
                    });
                    return StepRun::Completed(outcome);
                }
                Ok(None) => return StepRun::Skipped(SkipReason::Handler),
                Err(error) if attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        plan_id = %self.plan_id,
                        step_id = %step.id,
                        capability = %capability.name(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying step after error: {error:#}"
                    );
                    self.observer.on_event(&PlanEvent::StepRetry {
                        plan_id: self.plan_id.clone(),
                        step_id: step.id.clone(),
                        attempt,
                        delay,
                        error: format!("{error:#}"),
                    });
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => {
                    return StepRun::Failed(StepError::Handler {
                        capability: capability.name().to_string(),
                        attempts: attempt + 1,
                        source: error,
                    });
                }
            }
        }
    }

    /// Applies the step's `on_error` policy and records the outcome.
    pub fn settle(&self, step: &Step, run: StepRun, tally: &mut Tally) -> Settled {
        match run {
            StepRun::Completed(_) => Settled::Completed,
            StepRun::Skipped(reason) => {
                self.skip(step, reason, tally);
                Settled::Skipped
            }
            StepRun::Failed(error) => match step.retry_policy.on_error {
                OnError::Skip => {
                    debug!(step_id = %step.id, "step failed, skipping per policy: {error}");
                    self.skip(step, SkipReason::Policy, tally);
                    Settled::Skipped
                }
                on_error => {
                    let message = format!("Step {} failed: {error}", step.id);
                    self.observer.on_event(&PlanEvent::StepFailed {
                        plan_id: self.plan_id.clone(),
                        step_id: step.id.clone(),
                        error: error.to_string(),
                    });
                    tally.errors.push(message);
                    Settled::Failed {
                        abort: on_error == OnError::Abort,
                    }
                }
            },
        }
    }

    fn skip(&self, step: &Step, reason: SkipReason, tally: &mut Tally) {
        self.observer.on_event(&PlanEvent::StepSkipped {
            plan_id: self.plan_id.clone(),
            step_id: step.id.clone(),
            reason,
        });
        tally.skipped.push(step.id.clone());
    }
}
