//! Turns goals into plans, either heuristically from a message or through a
//! plan-text generator.

use super::parser::{ParsedStep, PlanMarkupParser, PlanTextParser};
use super::types::{ExecutionModel, Plan, RetryPolicy, Step};
use crate::capabilities::{CapabilityIndex, CapabilityRegistry};
use crate::config::PlannerConfig;
use crate::error::{PlanError, Result};
use crate::llm::{PlanTextGenerator, build_plan_prompt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPreferences {
    #[serde(default)]
    pub execution_model: Option<ExecutionModel>,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

/// Input to [`PlanBuilder::create_comprehensive_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    #[serde(default)]
    pub available_capabilities: Vec<String>,
    #[serde(default)]
    pub available_providers: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub preferences: PlanPreferences,
}

impl PlanRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.available_capabilities = capabilities;
        self
    }

    pub fn with_execution_model(mut self, model: ExecutionModel) -> Self {
        self.preferences.execution_model = Some(model);
        self
    }
}

/// Steps produced from parsed plan text, plus what had to be repaired.
#[derive(Debug, Clone, Default)]
pub struct AssembledSteps {
    pub steps: Vec<Step>,
    /// Dependencies removed because they named no known step or the step
    /// itself
    pub dropped_dependencies: usize,
    /// Steps rewritten to the default capability
    pub downgraded: usize,
    /// True when nothing parsed and the fallback step was used
    pub fell_back: bool,
}

pub struct PlanBuilder {
    registry: Arc<CapabilityRegistry>,
    generator: Arc<dyn PlanTextGenerator>,
    parser: Arc<dyn PlanTextParser>,
    config: PlannerConfig,
    retry_policy: RetryPolicy,
}

impl PlanBuilder {
    pub fn new(registry: Arc<CapabilityRegistry>, generator: Arc<dyn PlanTextGenerator>) -> Self {
        Self {
            registry,
            generator,
            parser: Arc::new(PlanMarkupParser),
            config: PlannerConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn PlanTextParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Retry policy given to every step this builder creates.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn generator(&self) -> &Arc<dyn PlanTextGenerator> {
        &self.generator
    }

    pub fn parser(&self) -> &Arc<dyn PlanTextParser> {
        &self.parser
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Builds a sequential chain without calling the generator.
    ///
    /// `declared_capabilities`, when non-empty, is used as-is; otherwise the
    /// capabilities are picked from keywords in the message.
    pub fn create_simple_plan(&self, message: &str, declared_capabilities: &[String]) -> Plan {
        let declared: Vec<String> = declared_capabilities
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect();
        let capabilities = if declared.is_empty() {
            heuristic_capabilities(message)
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            declared
        };

        let mut steps: Vec<Step> = Vec::with_capacity(capabilities.len());
        for capability in capabilities {
            let mut parameters = Map::new();
            parameters.insert("message".into(), Value::String(message.to_string()));
            let dependencies = steps.last().map(|prev| vec![prev.id.clone()]).unwrap_or_default();
            steps.push(
                Step::new(capability, parameters)
                    .with_dependencies(dependencies)
                    .with_retry_policy(self.retry_policy.clone()),
            );
        }

        let goal = if message.trim().is_empty() {
            "Execute plan"
        } else {
            message
        };
        let mut plan = Plan::new(goal, steps, ExecutionModel::Sequential);
        plan.metadata.insert("source".into(), json!("heuristic"));
        debug!(plan_id = %plan.id, steps = plan.steps.len(), "plan.simple");
        plan
    }

    /// Asks the generator for a plan and repairs what it returns.
    pub async fn create_comprehensive_plan(&self, request: &PlanRequest) -> Result<Plan> {
        if request.goal.trim().is_empty() {
            return Err(PlanError::EmptyGoal);
        }

        let prompt = build_plan_prompt(request);
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| PlanError::Generation(format!("{e:#}")))?;
        let parsed = self.parser.parse(&raw);

        let index = self.registry.index();
        let assembled = self.assemble_steps(parsed.steps, &HashMap::new(), &index);

        let goal = parsed
            .goal
            .unwrap_or_else(|| request.goal.trim().to_string());
        let execution_model = parsed
            .execution_model
            .or(request.preferences.execution_model)
            .unwrap_or(self.config.default_execution_model);

        let mut plan = Plan::new(goal, assembled.steps, execution_model);
        if let Some(thought) = parsed.thought {
            plan.thought = thought;
        }
        plan.metadata.insert("source".into(), json!("model"));
        plan.metadata.insert(
            "dropped_dependencies".into(),
            json!(assembled.dropped_dependencies),
        );
        plan.metadata
            .insert("downgraded_steps".into(), json!(assembled.downgraded));

        info!(
            plan_id = %plan.id,
            model = %plan.execution_model,
            steps = plan.steps.len(),
            fallback = assembled.fell_back,
            "plan.created"
        );
        Ok(plan)
    }

    /// Converts parsed steps into plan steps.
    ///
    /// Every parsed step gets a fresh id. `known` maps placeholders that
    /// already resolve (for example ids of kept steps) and is consulted
    /// before the parsed placeholders; the first mapping for a placeholder
    /// wins. Unresolvable and self-referencing dependencies are dropped.
    /// Capabilities missing from `index` are downgraded to the default
    /// capability. An empty input yields the single fallback step.
    pub fn assemble_steps(
        &self,
        parsed: Vec<ParsedStep>,
        known: &HashMap<String, String>,
        index: &CapabilityIndex,
    ) -> AssembledSteps {
        if parsed.is_empty() {
            let mut parameters = Map::new();
            parameters.insert("text".into(), json!(self.config.fallback_text));
            return AssembledSteps {
                steps: vec![
                    Step::new(&self.config.default_capability, parameters)
                        .with_retry_policy(self.retry_policy.clone()),
                ],
                fell_back: true,
                ..AssembledSteps::default()
            };
        }

        let mut placeholders = known.clone();
        let fresh: Vec<String> = parsed
            .iter()
            .map(|step| {
                let id = uuid::Uuid::new_v4().to_string();
                placeholders
                    .entry(step.placeholder_id.clone())
                    .or_insert_with(|| id.clone());
                id
            })
            .collect();

        let mut assembled = AssembledSteps::default();
        for (parsed_step, id) in parsed.into_iter().zip(fresh) {
            let mut dependencies: Vec<String> = Vec::with_capacity(parsed_step.dependencies.len());
            for placeholder in &parsed_step.dependencies {
                match placeholders.get(placeholder) {
                    Some(resolved) if *resolved != id => {
                        if !dependencies.contains(resolved) {
                            dependencies.push(resolved.clone());
                        }
                    }
                    Some(_) => {
                        debug!(step = %parsed_step.placeholder_id, "dropping self-dependency");
                        assembled.dropped_dependencies += 1;
                    }
                    None => {
                        debug!(
                            step = %parsed_step.placeholder_id,
                            dependency = %placeholder,
                            "dropping unresolved dependency"
                        );
                        assembled.dropped_dependencies += 1;
                    }
                }
            }

            let (capability_name, parameters) = if index.contains(&parsed_step.capability_name) {
                (parsed_step.capability_name, parsed_step.parameters)
            } else {
                debug!(
                    capability = %parsed_step.capability_name,
                    "downgrading unknown capability"
                );
                assembled.downgraded += 1;
                let mut parameters = Map::new();
                parameters.insert(
                    "text".into(),
                    json!(format!(
                        "Capability '{}' is not available for this step.",
                        parsed_step.capability_name
                    )),
                );
                (self.config.default_capability.clone(), parameters)
            };

            let mut step = Step::new(capability_name, parameters)
                .with_dependencies(dependencies)
                .with_retry_policy(self.retry_policy.clone());
            step.id = id;
            assembled.steps.push(step);
        }
        assembled
    }
}

/// Keyword rules for messages that name no capability.
fn heuristic_capabilities(message: &str) -> &'static [&'static str] {
    let text = message.to_lowercase();
    if text.contains("email") {
        &["send-email"]
    } else if text.contains("research") && (text.contains("send") || text.contains("summary")) {
        &["search", "reply"]
    } else if text.contains("search") || text.contains("find") || text.contains("research") {
        &["search"]
    } else if text.contains("analyz") {
        &["think", "reply"]
    } else {
        &["reply"]
    }
}
