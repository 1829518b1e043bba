//! Runs a plan under its execution model.
//!
//! One `execute_plan` call owns its scope (results, working memory,
//! cancellation token); nothing is shared between calls except the map of
//! running plans used by [`PlanExecutor::cancel_plan`]. Steps of a batch run
//! concurrently inside the calling task via `join_all`; nothing is spawned.
//! Cancellation is observed between steps (sequential) or between waves
//! (DAG) and never interrupts a handler that is already running.

mod step;

use self::step::{ExecutionScope, Settled, StepRun, Tally};
use super::types::{
    ExecutionModel, ParallelFailurePolicy, Plan, PlanExecutionResult, PlanStatus, Step,
};
use crate::capabilities::{CapabilityRegistry, RequestContext, WorkingMemory};
use crate::config::ExecutorConfig;
use crate::error::PlanError;
use crate::observability::{PlanEvent, PlanObserver};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a topology run ended.
struct TopologyOutcome {
    tally: Tally,
    /// Set when the token was found cancelled
    cancelled_at: Option<DateTime<Utc>>,
    /// List position the plan can be resumed from: every step before it
    /// completed or was skipped
    current_step_index: usize,
}

pub struct PlanExecutor {
    registry: Arc<CapabilityRegistry>,
    config: ExecutorConfig,
    /// Tokens of every running execution, by plan id. Overlapping runs of
    /// the same plan each hold their own entry.
    active: Mutex<HashMap<String, Vec<Arc<CancellationToken>>>>,
}

impl PlanExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            config: ExecutorConfig::default(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Requests cancellation of every running execution of a plan. Returns
    /// `false` when no execution with that id is active.
    pub fn cancel_plan(&self, plan_id: &str) -> bool {
        let active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match active.get(plan_id) {
            Some(tokens) => {
                tokens.iter().for_each(|token| token.cancel());
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, plan_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(plan_id)
    }

    /// Executes `plan` in place and reports what happened. Step failures are
    /// reported in the result, never as an `Err`.
    pub async fn execute_plan(
        &self,
        plan: &mut Plan,
        context: &RequestContext,
        observer: &dyn PlanObserver,
    ) -> PlanExecutionResult {
        let started = Instant::now();
        let token = Arc::new(CancellationToken::new());
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(plan.id.clone())
            .or_default()
            .push(Arc::clone(&token));

        plan.state.status = PlanStatus::Running;
        plan.state.start_time = Some(Utc::now());
        plan.state.end_time = None;
        plan.state.current_step_index = 0;
        plan.state.error = None;

        observer.on_event(&PlanEvent::PlanStarted {
            plan_id: plan.id.clone(),
            model: plan.execution_model,
            total_steps: plan.steps.len(),
        });

        let scope = ExecutionScope {
            plan_id: plan.id.clone(),
            index: self.registry.index(),
            request: Arc::new(context.clone()),
            working_memory: WorkingMemory::new(),
            results: tokio::sync::Mutex::new(Vec::new()),
            token: CancellationToken::clone(&token),
            observer,
        };

        let outcome = match plan.execution_model {
            ExecutionModel::Sequential => self.run_sequential(&plan.steps, &scope).await,
            ExecutionModel::Parallel => self.run_parallel(&plan.steps, &scope).await,
            ExecutionModel::Dag => self.run_dag(&plan.steps, &scope).await,
        };

        self.release(&plan.id, &token);

        let TopologyOutcome {
            mut tally,
            cancelled_at,
            current_step_index,
        } = outcome;

        let status = if cancelled_at.is_some() {
            tally.errors.push(PlanError::Cancelled.to_string());
            PlanStatus::Cancelled
        } else if tally.errors.is_empty() {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };

        plan.state.status = status;
        plan.state.current_step_index = current_step_index;
        plan.state.end_time = Some(cancelled_at.unwrap_or_else(Utc::now));
        plan.state.error = tally.errors.first().cloned();

        let results = scope.results.into_inner();
        let duration = started.elapsed();
        observer.on_event(&PlanEvent::PlanFinished {
            plan_id: plan.id.clone(),
            status,
            duration,
        });

        PlanExecutionResult {
            plan_id: plan.id.clone(),
            status,
            success: tally.errors.is_empty(),
            completed_steps: results.len(),
            total_steps: plan.steps.len(),
            results,
            errors: (!tally.errors.is_empty()).then_some(tally.errors),
            skipped_steps: tally.skipped,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Drops this call's token, leaving overlapping runs of the same plan
    /// cancellable.
    fn release(&self, plan_id: &str, token: &Arc<CancellationToken>) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(tokens) = active.get_mut(plan_id) {
            tokens.retain(|held| !Arc::ptr_eq(held, token));
            if tokens.is_empty() {
                active.remove(plan_id);
            }
        }
    }

    fn observe_cancel(scope: &ExecutionScope<'_>) -> DateTime<Utc> {
        scope.observer.on_event(&PlanEvent::PlanCancelled {
            plan_id: scope.plan_id.clone(),
        });
        Utc::now()
    }

    /// List order, one step at a time. Declared dependencies are not
    /// consulted.
    async fn run_sequential(&self, steps: &[Step], scope: &ExecutionScope<'_>) -> TopologyOutcome {
        let mut tally = Tally::default();
        let mut cancelled_at = None;
        let mut current_step_index = steps.len();

        for (index, step) in steps.iter().enumerate() {
            if scope.is_cancelled() {
                cancelled_at = Some(Self::observe_cancel(scope));
                current_step_index = index;
                break;
            }
            let run = scope.run_step(step).await;
            if scope.settle(step, run, &mut tally) == (Settled::Failed { abort: true }) {
                current_step_index = index;
                break;
            }
        }

        TopologyOutcome {
            tally,
            cancelled_at,
            current_step_index,
        }
    }

    /// Every step at once. Dependencies are ignored and `abort` cannot stop
    /// steps that are already running.
    async fn run_parallel(&self, steps: &[Step], scope: &ExecutionScope<'_>) -> TopologyOutcome {
        let mut tally = Tally::default();

        if scope.is_cancelled() {
            return TopologyOutcome {
                tally,
                cancelled_at: Some(Self::observe_cancel(scope)),
                current_step_index: 0,
            };
        }

        scope.observer.on_event(&PlanEvent::WaveStarted {
            plan_id: scope.plan_id.clone(),
            wave: 0,
            step_ids: steps.iter().map(|s| s.id.clone()).collect(),
        });

        let runs = join_all(steps.iter().map(|step| scope.run_step(step))).await;
        for (step, run) in steps.iter().zip(runs) {
            if let StepRun::Failed(error) = &run
                && self.config.parallel_failures == ParallelFailurePolicy::Drop
                && step.retry_policy.on_error != super::types::OnError::Skip
            {
                warn!(
                    plan_id = %scope.plan_id,
                    step_id = %step.id,
                    "parallel step failed, dropping: {error}"
                );
                continue;
            }
            scope.settle(step, run, &mut tally);
        }

        TopologyOutcome {
            tally,
            cancelled_at: None,
            current_step_index: steps.len(),
        }
    }

    /// Dependency-ordered waves. A wave holds every step whose in-plan
    /// dependencies have all finished; ties run in list order. Each wave is
    /// fully awaited before the next is formed.
    async fn run_dag(&self, steps: &[Step], scope: &ExecutionScope<'_>) -> TopologyOutcome {
        let positions: HashMap<&str, usize> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id.as_str(), index))
            .collect();

        let mut in_degree = vec![0_usize; steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
        for (index, step) in steps.iter().enumerate() {
            let unique: HashSet<&str> = step.dependencies.iter().map(String::as_str).collect();
            for dependency in unique {
                if let Some(&parent) = positions.get(dependency) {
                    in_degree[index] += 1;
                    dependents[parent].push(index);
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut tally = Tally::default();
        let mut cancelled_at = None;
        let mut aborted = false;
        let mut processed = 0;
        // Completed or skipped; failed and unscheduled steps stay false.
        let mut finished = vec![false; steps.len()];
        let mut wave_number = 0;

        while !ready.is_empty() {
            if scope.is_cancelled() {
                cancelled_at = Some(Self::observe_cancel(scope));
                break;
            }

            let mut wave = Vec::with_capacity(ready.len());
            while let Some(Reverse(index)) = ready.pop() {
                wave.push(index);
            }
            scope.observer.on_event(&PlanEvent::WaveStarted {
                plan_id: scope.plan_id.clone(),
                wave: wave_number,
                step_ids: wave.iter().map(|&i| steps[i].id.clone()).collect(),
            });
            debug!(plan_id = %scope.plan_id, wave = wave_number, width = wave.len(), "dag wave");

            let runs = join_all(wave.iter().map(|&i| scope.run_step(&steps[i]))).await;
            for (&index, run) in wave.iter().zip(runs) {
                match scope.settle(&steps[index], run, &mut tally) {
                    Settled::Completed | Settled::Skipped => finished[index] = true,
                    Settled::Failed { abort } => aborted |= abort,
                }
            }
            processed += wave.len();
            wave_number += 1;

            if aborted {
                break;
            }

            for &index in &wave {
                for &child in &dependents[index] {
                    in_degree[child] -= 1;
                    if in_degree[child] == 0 {
                        ready.push(Reverse(child));
                    }
                }
            }
        }

        if cancelled_at.is_none() && !aborted && processed < steps.len() {
            warn!(
                plan_id = %scope.plan_id,
                processed,
                total = steps.len(),
                "no steps ready to execute"
            );
            tally.errors.push(PlanError::Cycle.to_string());
        }

        TopologyOutcome {
            tally,
            cancelled_at,
            current_step_index: finished
                .iter()
                .position(|done| !done)
                .unwrap_or(steps.len()),
        }
    }
}
