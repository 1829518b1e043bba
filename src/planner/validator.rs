use super::types::{ExecutionModel, Plan};
use crate::capabilities::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Findings for one plan. Warnings never affect `ok`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Structural checks run before execution. Never mutates the plan.
pub struct PlanValidator {
    registry: Arc<CapabilityRegistry>,
    max_steps: usize,
}

impl PlanValidator {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            max_steps: 10,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn validate_plan(&self, plan: &Plan) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if plan.goal.trim().is_empty() {
            errors.push("Plan has no goal".to_string());
        }
        if plan.steps.is_empty() {
            errors.push("Plan has no steps".to_string());
        }
        if plan.steps.len() > self.max_steps {
            warnings.push(format!(
                "Plan has {} steps, more than the configured maximum of {}",
                plan.steps.len(),
                self.max_steps
            ));
        }

        let mut seen = HashSet::new();
        for step in &plan.steps {
            if !seen.insert(step.id.as_str()) {
                errors.push(format!("Duplicate step id '{}'", step.id));
            }
        }

        let index = self.registry.index();
        let positions = plan.step_index();

        for (position, step) in plan.steps.iter().enumerate() {
            match index.resolve(&step.capability_name) {
                Some(capability) => {
                    for parameter in capability.parameters() {
                        if parameter.required && !step.parameters.contains_key(&parameter.name) {
                            warnings.push(format!(
                                "Step {}: missing required parameter '{}' for capability '{}'",
                                step.id, parameter.name, step.capability_name
                            ));
                        }
                    }
                }
                None => errors.push(format!(
                    "Step {}: capability '{}' not found",
                    step.id, step.capability_name
                )),
            }

            for dependency in &step.dependencies {
                if *dependency == step.id {
                    errors.push(format!("Step {}: depends on itself", step.id));
                    continue;
                }
                let Some(&dep_position) = positions.get(dependency) else {
                    errors.push(format!(
                        "Step {}: dependency '{}' not found in plan",
                        step.id, dependency
                    ));
                    continue;
                };
                if plan.execution_model == ExecutionModel::Sequential && dep_position > position {
                    warnings.push(format!(
                        "Step {}: dependency '{}' runs later in sequential order",
                        step.id, dependency
                    ));
                }
            }

            if plan.execution_model == ExecutionModel::Parallel && !step.dependencies.is_empty() {
                warnings.push(format!(
                    "Step {}: dependencies are ignored by the parallel model",
                    step.id
                ));
            }
        }

        if plan.execution_model == ExecutionModel::Dag
            && let Some(path) = find_cycle(plan)
        {
            errors.push(format!(
                "circular dependencies detected: {}",
                path.join(" -> ")
            ));
        }

        ValidationReport {
            ok: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeState {
    Visiting,
    Visited,
}

/// First dependency cycle reachable in list order, as a closed path
/// (`a -> b -> a`). Self-dependencies and unknown ids are reported
/// elsewhere and ignored here.
fn find_cycle(plan: &Plan) -> Option<Vec<String>> {
    let known: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for step in &plan.steps {
        let edges = adjacency.entry(step.id.as_str()).or_default();
        for dependency in &step.dependencies {
            if *dependency != step.id && known.contains(dependency.as_str()) {
                edges.push(dependency.as_str());
            }
        }
    }

    let mut states: HashMap<&str, NodeState> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for step in &plan.steps {
        if states.contains_key(step.id.as_str()) {
            continue;
        }
        if let Some(path) = detect_cycle(step.id.as_str(), &adjacency, &mut states, &mut stack) {
            return Some(path.into_iter().map(ToString::to_string).collect());
        }
    }
    None
}

fn detect_cycle<'a>(
    node_id: &'a str,
    adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
    states: &mut HashMap<&'a str, NodeState>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<&'a str>> {
    states.insert(node_id, NodeState::Visiting);
    stack.push(node_id);

    if let Some(neighbors) = adjacency.get(node_id) {
        for &neighbor in neighbors {
            match states.get(neighbor) {
                Some(NodeState::Visiting) => {
                    let start = stack.iter().position(|entry| *entry == neighbor)?;
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(NodeState::Visited) => {}
                None => {
                    if let Some(path) = detect_cycle(neighbor, adjacency, states, stack) {
                        return Some(path);
                    }
                }
            }
        }
    }

    stack.pop();
    states.insert(node_id, NodeState::Visited);
    None
}
