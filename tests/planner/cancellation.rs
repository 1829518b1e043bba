use std::sync::Arc;
use std::time::Duration;

use planforge::capabilities::RequestContext;
use planforge::planner::{ExecutionModel, Plan, PlanExecutor, PlanStatus};

use super::plan_harness::{RecordingObserver, ScriptedCapability, registry_with, step};

fn slow_executor() -> (PlanExecutor, Arc<ScriptedCapability>) {
    let slow = Arc::new(ScriptedCapability::ok("slow").with_delay(Duration::from_millis(1000)));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[Arc::clone(&slow)])));
    (executor, slow)
}

#[tokio::test(start_paused = true)]
async fn sequential_cancel_lets_the_running_step_finish() {
    let (executor, slow) = slow_executor();
    let mut plan = Plan::new(
        "three slow steps",
        vec![
            step("a", "slow", &[]),
            step("b", "slow", &[]),
            step("c", "slow", &[]),
        ],
        ExecutionModel::Sequential,
    );
    let plan_id = plan.id.clone();
    let observer = RecordingObserver::new();
    let context = RequestContext::default();

    let (result, cancelled) = tokio::join!(
        executor.execute_plan(&mut plan, &context, &observer),
        async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            executor.cancel_plan(&plan_id)
        }
    );

    assert!(cancelled);
    assert_eq!(slow.call_count(), 2);
    assert_eq!(result.status, PlanStatus::Cancelled);
    assert!(!result.success);
    assert_eq!(result.completed_steps, 2);
    assert_eq!(
        result.errors,
        Some(vec!["plan execution cancelled".to_string()])
    );
    assert!(observer.saw_cancel());
    assert_eq!(plan.state.status, PlanStatus::Cancelled);
    assert_eq!(plan.state.current_step_index, 2);
    assert!(plan.state.end_time.is_some());
    assert!(!executor.is_running(&plan_id));
}

#[tokio::test(start_paused = true)]
async fn dag_cancel_is_observed_between_waves() {
    let (executor, slow) = slow_executor();
    let mut plan = Plan::new(
        "chain",
        vec![
            step("a", "slow", &[]),
            step("b", "slow", &["a"]),
            step("c", "slow", &["b"]),
        ],
        ExecutionModel::Dag,
    );
    let plan_id = plan.id.clone();
    let observer = RecordingObserver::new();
    let context = RequestContext::default();

    let (result, cancelled) = tokio::join!(
        executor.execute_plan(&mut plan, &context, &observer),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            executor.cancel_plan(&plan_id)
        }
    );

    assert!(cancelled);
    assert_eq!(slow.call_count(), 1);
    assert_eq!(result.status, PlanStatus::Cancelled);
    assert_eq!(result.completed_steps, 1);
    assert_eq!(observer.waves().len(), 1);
    assert_eq!(plan.state.current_step_index, 1);
}

#[tokio::test]
async fn cancel_after_completion_is_a_no_op() {
    let work = Arc::new(ScriptedCapability::ok("work"));
    let executor = PlanExecutor::new(Arc::new(registry_with(&[work])));
    let mut plan = Plan::new("done", vec![step("a", "work", &[])], ExecutionModel::Sequential);

    let result = executor
        .execute_plan(&mut plan, &RequestContext::default(), &RecordingObserver::new())
        .await;

    assert!(result.success);
    assert!(!executor.cancel_plan(&plan.id));
    assert!(!executor.cancel_plan("never-started"));
    assert_eq!(plan.state.status, PlanStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn overlapping_runs_of_one_plan_stay_cancellable() {
    let (executor, slow) = slow_executor();
    let mut long = Plan::new(
        "shared id",
        vec![
            step("a", "slow", &[]),
            step("b", "slow", &[]),
            step("c", "slow", &[]),
        ],
        ExecutionModel::Sequential,
    );
    let mut short = long.clone();
    short.steps.truncate(1);
    let plan_id = long.id.clone();
    let context = RequestContext::default();
    let (long_observer, short_observer) = (RecordingObserver::new(), RecordingObserver::new());

    let (long_result, short_result, cancelled) = tokio::join!(
        executor.execute_plan(&mut long, &context, &long_observer),
        executor.execute_plan(&mut short, &context, &short_observer),
        async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            executor.cancel_plan(&plan_id)
        }
    );

    assert!(short_result.success);
    assert!(cancelled);
    assert_eq!(long_result.status, PlanStatus::Cancelled);
    assert_eq!(long_result.completed_steps, 2);
    assert_eq!(slow.call_count(), 3);
    assert!(!executor.is_running(&plan_id));
}
