//! Reads the plan text a generator returns.
//!
//! Two shapes are accepted: the `<plan>` markup described by
//! [`crate::llm::PLAN_FORMAT`], and a JSON object with the same fields,
//! optionally inside a fenced code block. Parsing never fails; text that
//! yields nothing usable produces a [`ParsedPlan`] with no steps.

use super::types::ExecutionModel;
use serde::Deserialize;
use serde_json::{Map, Value};

/// One step as the generator declared it, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStep {
    /// The generator's own id for the step; only meaningful inside one reply
    pub placeholder_id: String,
    pub capability_name: String,
    pub parameters: Map<String, Value>,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub goal: Option<String>,
    pub thought: Option<String>,
    pub execution_model: Option<ExecutionModel>,
    pub steps: Vec<ParsedStep>,
}

pub trait PlanTextParser: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedPlan;
}

/// Default parser for `<plan>` markup and JSON plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanMarkupParser;

impl PlanTextParser for PlanMarkupParser {
    fn parse(&self, raw: &str) -> ParsedPlan {
        if raw.contains("<step>") || raw.contains("<plan>") {
            return parse_markup(raw);
        }
        extract_json(raw)
            .and_then(|json| serde_json::from_str::<RawPlan>(json).ok())
            .map(RawPlan::into_parsed)
            .unwrap_or_default()
    }
}

// ─── Markup ──────────────────────────────────────────────────────────────────

/// Content of the first `<tag>...</tag>` in `text`, trimmed. Empty content
/// counts as absent.
fn tag_content<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    let content = text[start..end].trim();
    (!content.is_empty()).then_some(content)
}

/// Every `<tag>...</tag>` block in order. An unclosed trailing block is
/// ignored.
fn tag_blocks<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(&open) {
        let body = &rest[start + open.len()..];
        let Some(end) = body.find(&close) else {
            break;
        };
        blocks.push(&body[..end]);
        rest = &body[end + close.len()..];
    }
    blocks
}

fn parse_markup(raw: &str) -> ParsedPlan {
    // Plan-level tags live before the step list so a step cannot shadow them.
    let header = raw.find("<steps>").map_or(raw, |pos| &raw[..pos]);

    let steps = tag_blocks(raw, "step")
        .into_iter()
        .filter_map(|block| {
            let placeholder_id = tag_content(block, "id")?;
            let capability_name = tag_content(block, "action")?;
            Some(ParsedStep {
                placeholder_id: placeholder_id.to_string(),
                capability_name: capability_name.to_string(),
                parameters: tag_content(block, "parameters")
                    .map(parse_parameters)
                    .unwrap_or_default(),
                dependencies: tag_content(block, "dependencies")
                    .map(parse_dependencies)
                    .unwrap_or_default(),
            })
        })
        .collect();

    ParsedPlan {
        goal: tag_content(header, "goal").map(ToString::to_string),
        thought: tag_content(header, "thought").map(ToString::to_string),
        execution_model: tag_content(header, "execution_model").map(ExecutionModel::from_lenient),
        steps,
    }
}

fn parse_parameters(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn parse_dependencies(text: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<Value>>(text) {
        Ok(values) => values.into_iter().filter_map(dependency_id).collect(),
        Err(_) => Vec::new(),
    }
}

/// Dependency ids may arrive as strings or bare numbers.
fn dependency_id(value: Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ─── JSON ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    goal: Option<String>,
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    execution_model: Option<String>,
    #[serde(default)]
    steps: Vec<Value>,
}

impl RawPlan {
    fn into_parsed(self) -> ParsedPlan {
        let steps = self.steps.into_iter().filter_map(raw_step).collect();
        ParsedPlan {
            goal: self.goal.filter(|g| !g.trim().is_empty()),
            thought: self.thought.filter(|t| !t.trim().is_empty()),
            execution_model: self
                .execution_model
                .as_deref()
                .map(ExecutionModel::from_lenient),
            steps,
        }
    }
}

/// Steps are read field by field so one malformed step does not discard
/// the rest of the plan.
fn raw_step(value: Value) -> Option<ParsedStep> {
    let Value::Object(mut fields) = value else {
        return None;
    };
    let placeholder_id = fields.remove("id").and_then(dependency_id)?;
    let capability_name = match fields.remove("action") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return None,
    };
    let parameters = match fields.remove("parameters") {
        Some(Value::Object(map)) => map,
        Some(Value::String(text)) => parse_parameters(&text),
        _ => Map::new(),
    };
    let dependencies = match fields.remove("dependencies") {
        Some(Value::Array(values)) => values.into_iter().filter_map(dependency_id).collect(),
        Some(Value::String(text)) => parse_dependencies(&text),
        _ => Vec::new(),
    };
    Some(ParsedStep {
        placeholder_id,
        capability_name,
        parameters,
        dependencies,
    })
}

/// Locates a JSON object in model output: a ```json fence, a bare fence
/// opening with `{`, or the outermost braces.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    if let Some(start) = text.find("```\n{") {
        let rest = &text[start + "```\n".len()..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}
