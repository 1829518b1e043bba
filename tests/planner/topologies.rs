use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use planforge::capabilities::RequestContext;
use planforge::config::ExecutorConfig;
use planforge::planner::{
    ExecutionModel, OnError, ParallelFailurePolicy, Plan, PlanExecutor, PlanStatus, Step,
};

use super::plan_harness::{RecordingObserver, ScriptedCapability, registry_with, step};

fn on_error(mut step: Step, on_error: OnError) -> Step {
    step.retry_policy.on_error = on_error;
    step
}

#[tokio::test]
async fn every_wave_only_holds_steps_whose_dependencies_ran_earlier() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[Arc::clone(&work)])));
    let steps = vec![
        step("fetch", "work", &[]),
        step("parse", "work", &["fetch"]),
        step("lint", "work", &[]),
        step("index", "work", &["parse", "lint"]),
        step("report", "work", &["index", "fetch"]),
        step("notify", "work", &["lint"]),
    ];
    let dependencies: HashMap<String, Vec<String>> = steps
        .iter()
        .map(|s| (s.id.clone(), s.dependencies.clone()))
        .collect();
    let mut plan = Plan::new("pipeline", steps, ExecutionModel::Dag);
    let observer = RecordingObserver::new();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &observer)
        .await;
    assert!(result.success);
    assert_eq!(result.completed_steps, 6);

    let waves = observer.waves();
    assert_eq!(waves[0], vec!["fetch".to_string(), "lint".to_string()]);
    let mut finished: Vec<String> = Vec::new();
    for wave in &waves {
        for id in wave {
            for dependency in &dependencies[id] {
                assert!(
                    finished.contains(dependency),
                    "{id} ran before its dependency {dependency}"
                );
            }
        }
        finished.extend(wave.iter().cloned());
    }
    assert_eq!(finished.len(), 6);
}

#[tokio::test]
async fn sequential_steps_see_all_earlier_results() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[Arc::clone(&work)])));
    let mut plan = Plan::new(
        "chain",
        vec![
            step("a", "work", &[]),
            step("b", "work", &[]),
            step("c", "work", &[]),
        ],
        ExecutionModel::Sequential,
    );

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    let seen: Vec<usize> = work.calls().iter().map(|c| c.results_seen).collect();
    assert_eq!(seen, vec![0, 1, 2]);
    let order: Vec<&str> = result.results.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(plan.state.current_step_index, 3);
}

#[tokio::test]
async fn rejected_and_empty_steps_are_skipped_not_failed() {
    let picky = Arc::new(ScriptedCapability::ok("picky").rejecting());
    let quiet = Arc::new(ScriptedCapability::ok("quiet").skipping());
    let executor = PlanExecutor::new(Arc::new(registry_with(&[
        Arc::clone(&picky),
        Arc::clone(&quiet),
    ])));
    let mut plan = Plan::new(
        "skips",
        vec![step("a", "picky", &[]), step("b", "quiet", &[])],
        ExecutionModel::Sequential,
    );

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert!(result.success);
    assert_eq!(result.status, PlanStatus::Completed);
    assert_eq!(result.completed_steps, 0);
    assert!(result.errors.is_none());
    assert_eq!(result.skipped_steps, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(picky.call_count(), 0);
    assert_eq!(quiet.call_count(), 1);
}

#[tokio::test]
async fn on_error_policies_in_sequential_order() {
    let broken = Arc::new(ScriptedCapability::broken("broken"));
    let work = Arc::new(ScriptedCapability::ok("work"));
    let registry = Arc::new(registry_with(&[Arc::clone(&broken), Arc::clone(&work)]));
    let executor = PlanExecutor::new(registry);

    let mut skipping = Plan::new(
        "skip",
        vec![
            on_error(step("a", "broken", &[]), OnError::Skip),
            step("b", "work", &[]),
        ],
        ExecutionModel::Sequential,
    );
    let result = executor
        .execute_plan(&mut skipping, &RequestContext::default(), &RecordingObserver::new())
        .await;
    assert!(result.success);
    assert_eq!(result.skipped_steps, vec!["a".to_string()]);
    assert_eq!(result.completed_steps, 1);

    let mut continuing = Plan::new(
        "continue",
        vec![
            on_error(step("a", "broken", &[]), OnError::Continue),
            step("b", "work", &[]),
        ],
        ExecutionModel::Sequential,
    );
    let result = executor
        .execute_plan(&mut continuing, &RequestContext::default(), &RecordingObserver::new())
        .await;
    assert!(!result.success);
    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 1);
    assert_eq!(result.errors.as_ref().map(Vec::len), Some(1));
    assert_eq!(continuing.state.current_step_index, 2);

    let mut aborting = Plan::new(
        "abort",
        vec![step("a", "broken", &[]), step("b", "work", &[])],
        ExecutionModel::Sequential,
    );
    let calls_before = work.call_count();
    let result = executor
        .execute_plan(&mut aborting, &RequestContext::default(), &RecordingObserver::new())
        .await;
    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 0);
    assert_eq!(work.call_count(), calls_before);
    assert_eq!(aborting.state.current_step_index, 0);
    assert!(
        aborting
            .state
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Step a failed:"))
    );
}

#[tokio::test]
async fn unknown_capability_fails_without_retrying() {
    let executor = PlanExecutor::new(Arc::new(registry_with(&[])));
    let mut missing = step("a", "teleport", &[]);
    missing.retry_policy.max_retries = 5;
    let mut plan = Plan::new("missing", vec![missing], ExecutionModel::Sequential);
    let observer = RecordingObserver::new();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &observer)
        .await;

    assert!(observer.retries().is_empty());
    assert!(result.errors.unwrap()[0].contains("capability 'teleport' not found"));
}

fn parallel_plan() -> Plan {
    Plan::new(
        "fan out",
        vec![
            step("a", "work", &[]),
            step("b", "broken", &[]),
            step("c", "work", &["b"]),
        ],
        ExecutionModel::Parallel,
    )
}

#[tokio::test]
async fn parallel_failures_are_recorded_by_default() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let broken = Arc::new(ScriptedCapability::broken("broken"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[work, broken])));
    let mut plan = parallel_plan();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 2);
    assert_eq!(result.errors.as_ref().map(Vec::len), Some(1));
    assert_eq!(plan.state.current_step_index, 3);
}

#[tokio::test]
async fn parallel_drop_policy_only_warns() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let broken = Arc::new(ScriptedCapability::broken("broken"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[work, Arc::clone(&broken)])))
        .with_config(ExecutorConfig {
            parallel_failures: ParallelFailurePolicy::Drop,
            ..ExecutorConfig::default()
        });
    let mut plan = parallel_plan();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert!(result.success);
    assert_eq!(result.status, PlanStatus::Completed);
    assert_eq!(result.completed_steps, 2);
    assert!(result.errors.is_none());
    assert!(result.skipped_steps.is_empty());
    assert_eq!(broken.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn parallel_steps_overlap() {
    let slow = Arc::new(ScriptedCapability::ok("slow").with_delay(Duration::from_millis(1000)));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[Arc::clone(&slow)])));
    let mut plan = Plan::new(
        "overlap",
        vec![step("a", "slow", &[]), step("b", "slow", &[])],
        ExecutionModel::Parallel,
    );

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert!(result.success);
    assert!(result.duration_ms < 2000, "took {}ms", result.duration_ms);
    let calls = slow.calls();
    assert_eq!(calls[0].at, calls[1].at);
}

#[tokio::test]
async fn dag_abort_stops_after_the_current_wave() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let broken = Arc::new(ScriptedCapability::broken("broken"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[
        Arc::clone(&work),
        Arc::clone(&broken),
    ])));
    let mut plan = Plan::new(
        "abort",
        vec![
            step("a", "broken", &[]),
            step("b", "work", &[]),
            step("c", "work", &["a"]),
        ],
        ExecutionModel::Dag,
    );
    let observer = RecordingObserver::new();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &observer)
        .await;

    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 1);
    assert_eq!(work.call_count(), 1);
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].contains("circular"));
    assert_eq!(observer.waves().len(), 1);
    assert_eq!(plan.state.current_step_index, 0);
}

#[tokio::test]
async fn dag_continue_releases_dependents() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let broken = Arc::new(ScriptedCapability::broken("broken"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[
        Arc::clone(&work),
        Arc::clone(&broken),
    ])));
    let mut plan = Plan::new(
        "continue",
        vec![
            on_error(step("a", "broken", &[]), OnError::Continue),
            step("b", "work", &["a"]),
            step("c", "work", &["b", "ghost"]),
        ],
        ExecutionModel::Dag,
    );
    let observer = RecordingObserver::new();

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &observer)
        .await;

    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 2);
    assert_eq!(result.errors.map(|e| e.len()), Some(1));
    assert_eq!(observer.waves().len(), 3);
    assert_eq!(plan.state.current_step_index, 0);
}

#[tokio::test]
async fn dag_cycle_is_reported_at_runtime() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[Arc::clone(&work)])));
    let mut plan = Plan::new(
        "stuck",
        vec![
            step("a", "work", &[]),
            step("b", "work", &["c"]),
            step("c", "work", &["b"]),
        ],
        ExecutionModel::Dag,
    );

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert_eq!(result.status, PlanStatus::Failed);
    assert_eq!(result.completed_steps, 1);
    assert_eq!(
        result.errors.unwrap(),
        vec!["No steps ready to execute - possible circular dependency".to_string()]
    );
    assert_eq!(plan.state.current_step_index, 1);
}
