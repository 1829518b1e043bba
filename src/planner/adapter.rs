use super::builder::PlanBuilder;
use super::types::{Plan, Step, StepOutcome};
use crate::llm::build_adaptation_prompt;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What an adaptation did to the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adaptation {
    /// Steps kept verbatim from the front of the plan
    pub kept: usize,
    /// Steps appended after them
    pub added: usize,
    /// True when the generator could not help and the fallback step was used
    pub fell_back: bool,
}

/// Replaces the unexecuted tail of a plan with a freshly generated one.
pub struct PlanAdapter {
    builder: Arc<PlanBuilder>,
}

impl PlanAdapter {
    pub fn new(builder: Arc<PlanBuilder>) -> Self {
        Self { builder }
    }

    /// Keeps `plan.steps[..current_step_index]` and replaces the rest.
    ///
    /// Never fails: a generator error or an empty reply leaves a single
    /// fallback reply step as the new tail. Generated steps may depend on
    /// kept steps by id.
    pub async fn adapt_plan(
        &self,
        plan: &mut Plan,
        current_step_index: usize,
        completed_results: &[StepOutcome],
        error: &str,
    ) -> Adaptation {
        let kept = current_step_index.min(plan.steps.len());
        let prompt = build_adaptation_prompt(plan, kept, completed_results, error);

        let parsed = match self.builder.generator().generate(&prompt).await {
            Ok(text) => self.builder.parser().parse(&text).steps,
            Err(e) => {
                warn!(plan_id = %plan.id, "plan adaptation failed, using fallback: {e:#}");
                Vec::new()
            }
        };

        let (tail, dropped, fell_back) = if parsed.is_empty() {
            (vec![self.fallback_step()], 0, true)
        } else {
            let known: HashMap<String, String> = plan.steps[..kept]
                .iter()
                .map(|step| (step.id.clone(), step.id.clone()))
                .collect();
            let assembled =
                self.builder
                    .assemble_steps(parsed, &known, &self.builder.registry().index());
            (assembled.steps, assembled.dropped_dependencies, false)
        };

        plan.steps.truncate(kept);
        let added = tail.len();
        plan.steps.extend(tail);

        bump_counter(&mut plan.metadata, "adaptations", 1);
        if dropped > 0 {
            bump_counter(&mut plan.metadata, "dropped_dependencies", dropped);
        }

        info!(plan_id = %plan.id, kept, added, fallback = fell_back, "plan.adapt");
        Adaptation {
            kept,
            added,
            fell_back,
        }
    }

    fn fallback_step(&self) -> Step {
        let config = self.builder.config();
        let mut parameters = Map::new();
        parameters.insert("text".into(), json!(config.adapt_fallback_text));
        Step::new(&config.default_capability, parameters)
            .with_retry_policy(self.builder.retry_policy().clone())
    }
}

fn bump_counter(metadata: &mut Map<String, Value>, key: &str, by: usize) {
    let current = metadata.get(key).and_then(Value::as_u64).unwrap_or(0);
    let by = u64::try_from(by).unwrap_or(u64::MAX);
    metadata.insert(key.into(), json!(current.saturating_add(by)));
}
