use super::{Cli, Commands};
use crate::capabilities::{CapabilityRegistry, RequestContext, builtin_registry};
use crate::config::Config;
use crate::llm::{CompatibleGenerator, PlanTextGenerator, ReliableGenerator};
use crate::observability::create_observer;
use crate::planner::{
    Plan, PlanAdapter, PlanBuilder, PlanExecutionResult, PlanExecutor, PlanRequest, PlanValidator,
};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_plan(path: &Path) -> Result<Plan> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    serde_json::from_str(&contents).context("Failed to parse plan JSON")
}

/// Generator built from the `[model]` section, retried on transient errors.
fn generator(config: &Config) -> Arc<dyn PlanTextGenerator> {
    Arc::new(ReliableGenerator::new(
        CompatibleGenerator::from_config(&config.model),
        2,
        500,
    ))
}

fn builder(config: &Config, registry: &Arc<CapabilityRegistry>) -> PlanBuilder {
    PlanBuilder::new(Arc::clone(registry), generator(config))
        .with_config(config.planner.clone())
        .with_retry_policy(config.executor.retry.clone())
}

async fn execute(
    config: &Config,
    registry: &Arc<CapabilityRegistry>,
    plan: &mut Plan,
    message: Option<String>,
    adapt: bool,
) -> Result<PlanExecutionResult> {
    let executor =
        PlanExecutor::new(Arc::clone(registry)).with_config(config.executor.clone());
    let observer = create_observer(&config.observability);
    let context = message.map(RequestContext::with_message).unwrap_or_default();

    let result = executor
        .execute_plan(plan, &context, observer.as_ref())
        .await;
    if result.success || !adapt {
        return Ok(result);
    }

    let error = result
        .errors
        .as_ref()
        .and_then(|errors| errors.first().cloned())
        .unwrap_or_default();
    let stopped_at = plan.state.current_step_index;
    let adapter = PlanAdapter::new(Arc::new(builder(config, registry)));
    let adaptation = adapter
        .adapt_plan(plan, stopped_at, &result.results, &error)
        .await;
    info!(
        kept = adaptation.kept,
        added = adaptation.added,
        "re-running adapted plan"
    );
    Ok(executor
        .execute_plan(plan, &context, observer.as_ref())
        .await)
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let registry = Arc::new(builtin_registry());

    match cli.command {
        Commands::Simple {
            message,
            capabilities,
        } => {
            let plan = builder(&config, &registry).create_simple_plan(&message, &capabilities);
            print_json(&plan)
        }

        Commands::Validate { plan } => {
            let plan = read_plan(&plan).await?;
            let report = PlanValidator::new(Arc::clone(&registry))
                .with_max_steps(config.planner.max_steps)
                .validate_plan(&plan);
            print_json(&report)?;
            if !report.ok {
                bail!("plan failed validation with {} error(s)", report.errors.len());
            }
            Ok(())
        }

        Commands::Run {
            plan,
            message,
            force,
            adapt,
        } => {
            let mut plan = read_plan(&plan).await?;
            let report = PlanValidator::new(Arc::clone(&registry))
                .with_max_steps(config.planner.max_steps)
                .validate_plan(&plan);
            if !report.ok && !force {
                print_json(&report)?;
                bail!("plan failed validation; pass --force to run it anyway");
            }
            let result = execute(&config, &registry, &mut plan, message, adapt).await?;
            print_json(&result)
        }

        Commands::Generate {
            goal,
            execution_model,
            constraints,
            run,
        } => {
            let mut request = PlanRequest::new(goal.clone());
            request.available_capabilities =
                registry.names().into_iter().map(ToString::to_string).collect();
            request.constraints = constraints;
            request.preferences.execution_model = execution_model;
            request.preferences.max_steps = Some(config.planner.max_steps);

            let mut plan = builder(&config, &registry)
                .create_comprehensive_plan(&request)
                .await?;
            print_json(&plan)?;
            if run {
                let result = execute(&config, &registry, &mut plan, Some(goal), true).await?;
                print_json(&result)?;
            }
            Ok(())
        }
    }
}
