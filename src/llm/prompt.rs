//! Prompt text for plan generation and adaptation.

use super::traits::PlanPrompt;
use crate::planner::{Plan, PlanRequest, StepOutcome};
use std::fmt::Write;

const PLAN_SYSTEM: &str = "You are an expert planning system. Break the goal into the smallest \
sequence of capability invocations that achieves it. Only use capabilities from the list you are \
given. Answer with the plan and nothing else.";

const ADAPT_SYSTEM: &str = "You are an expert planning system. A plan failed part way through. \
Produce replacement steps that finish the goal using the results already gathered. Answer with \
the plan and nothing else.";

/// Plan-text format every prompt asks for; matches what `PlanMarkupParser`
/// reads.
pub const PLAN_FORMAT: &str = r#"<plan>
  <goal>restated goal</goal>
  <thought>why these steps</thought>
  <execution_model>sequential | parallel | dag</execution_model>
  <steps>
    <step>
      <id>step_1</id>
      <action>capability name</action>
      <parameters>{"key": "value"}</parameters>
      <dependencies>[]</dependencies>
    </step>
  </steps>
</plan>"#;

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)\n".to_string();
    }
    items.iter().fold(String::new(), |mut out, item| {
        let _ = writeln!(out, "- {item}");
        out
    })
}

/// Prompt for building a plan from scratch.
pub fn build_plan_prompt(request: &PlanRequest) -> PlanPrompt {
    let mut user = String::new();
    let _ = writeln!(user, "GOAL: {}\n", request.goal.trim());
    let _ = writeln!(user, "AVAILABLE CAPABILITIES:");
    user.push_str(&bullet_list(&request.available_capabilities));
    if !request.available_providers.is_empty() {
        let _ = writeln!(user, "\nCONTEXT PROVIDERS:");
        user.push_str(&bullet_list(&request.available_providers));
    }
    if !request.constraints.is_empty() {
        let _ = writeln!(user, "\nCONSTRAINTS:");
        user.push_str(&bullet_list(&request.constraints));
    }

    let preferences = &request.preferences;
    let _ = writeln!(user, "\nPREFERENCES:");
    if let Some(model) = preferences.execution_model {
        let _ = writeln!(user, "- execution model: {model}");
    }
    if let Some(max_steps) = preferences.max_steps {
        let _ = writeln!(user, "- at most {max_steps} steps");
    }
    let _ = writeln!(
        user,
        "- step ids are placeholders; dependencies refer to them"
    );

    let _ = write!(user, "\nRespond in this format:\n{PLAN_FORMAT}");
    PlanPrompt::new(PLAN_SYSTEM, user)
}

/// Prompt for replacing the unexecuted tail of a plan.
pub fn build_adaptation_prompt(
    plan: &Plan,
    current_step_index: usize,
    completed_results: &[StepOutcome],
    error: &str,
) -> PlanPrompt {
    let mut user = String::new();
    let _ = writeln!(user, "ORIGINAL GOAL: {}\n", plan.goal);
    let _ = writeln!(user, "ORIGINAL STEPS:");
    for (index, step) in plan.steps.iter().enumerate() {
        let marker = if index < current_step_index {
            "done"
        } else {
            "pending"
        };
        let _ = writeln!(
            user,
            "{index}. [{marker}] id={} action={}",
            step.id, step.capability_name
        );
    }

    let _ = writeln!(user, "\nSTOPPED AT STEP: {current_step_index}");
    let _ = writeln!(user, "ERROR: {error}\n");
    let _ = writeln!(user, "RESULTS SO FAR:");
    if completed_results.is_empty() {
        let _ = writeln!(user, "- (none)");
    }
    for outcome in completed_results {
        let _ = writeln!(
            user,
            "- {} ({}): {}",
            outcome.step_id,
            outcome.capability,
            outcome.text.as_deref().unwrap_or("(no text)")
        );
    }

    let _ = writeln!(
        user,
        "\nDescribe only the steps still to run. A dependency may name a completed step's id."
    );
    let _ = write!(user, "\nRespond in this format:\n{PLAN_FORMAT}");
    PlanPrompt::new(ADAPT_SYSTEM, user)
}
