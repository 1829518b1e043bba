use std::sync::Arc;

use planforge::capabilities::builtin_registry;
use planforge::planner::{ExecutionModel, Plan, PlanBuilder, PlanRequest, PlanValidator};

use super::plan_harness::{QueueGenerator, step};

#[test]
fn validation_is_idempotent() {
    let validator = PlanValidator::new(Arc::new(builtin_registry()));
    let plan = Plan::new(
        "mixed",
        vec![
            step("a", "reply", &[]),
            step("b", "teleport", &["a", "ghost"]),
            step("c", "think", &["c"]),
        ],
        ExecutionModel::Dag,
    );

    let first = validator.validate_plan(&plan);
    let second = validator.validate_plan(&plan);

    assert!(!first.ok);
    assert_eq!(first, second);
    assert_eq!(first.errors.len(), 3);
}

#[test]
fn heuristic_plans_validate_when_capabilities_exist() {
    let registry = Arc::new(builtin_registry());
    let builder = PlanBuilder::new(Arc::clone(&registry), Arc::new(QueueGenerator::default()));
    let validator = PlanValidator::new(registry);

    let plan = builder.create_simple_plan("analyze the quarterly numbers", &[]);
    let report = validator.validate_plan(&plan);

    assert!(report.ok, "{:?}", report.errors);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn model_plans_validate_after_repair() {
    let registry = Arc::new(builtin_registry());
    let generator = Arc::new(QueueGenerator::new(vec![Ok(r#"
        <plan>
          <execution_model>dag</execution_model>
          <steps>
            <step><id>1</id><action>think</action><dependencies>["1", "9"]</dependencies></step>
            <step><id>2</id><action>teleport</action><dependencies>[1]</dependencies></step>
            <step><id>3</id><action>reply</action><dependencies>["2", "2"]</dependencies></step>
          </steps>
        </plan>
    "#)]));
    let builder = PlanBuilder::new(Arc::clone(&registry), generator);

    let plan = builder
        .create_comprehensive_plan(&PlanRequest::new("explain the outage"))
        .await
        .unwrap();
    let report = PlanValidator::new(registry).validate_plan(&plan);

    assert!(report.ok, "{:?}", report.errors);
    assert_eq!(plan.execution_model, ExecutionModel::Dag);
    assert_eq!(plan.steps[1].capability_name, "reply");
    assert_eq!(plan.steps[2].dependencies, vec![plan.steps[1].id.clone()]);
    assert_eq!(plan.metadata["dropped_dependencies"], 2);
    assert_eq!(plan.metadata["downgraded_steps"], 1);
}
