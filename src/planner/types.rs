use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

/// How the executor schedules a plan's steps.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionModel {
    /// One step at a time, in list order.
    #[default]
    Sequential,
    /// Every step at once, no ordering.
    Parallel,
    /// Dependency-ordered waves.
    Dag,
}

impl ExecutionModel {
    /// Parses model-authored text, falling back to `Sequential` for anything
    /// unrecognised.
    pub fn from_lenient(value: &str) -> Self {
        Self::from_str(value.trim()).unwrap_or_default()
    }
}

/// What a permanently failed step does to the rest of the plan.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OnError {
    #[default]
    Abort,
    Continue,
    Skip,
}

/// What the parallel topology does with a step that still fails after its
/// retries.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ParallelFailurePolicy {
    /// The failure lands in `errors` and the run is `failed`.
    #[default]
    Record,
    /// The failed step is absent from both `results` and `errors`; only a
    /// warning is logged. A run can then report `success` while a step never
    /// produced anything.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    #[serde(default)]
    pub on_error: OnError,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> u32 {
    2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            on_error: OnError::default(),
        }
    }
}

impl RetryPolicy {
    /// No retries and no waiting; failures surface on the first attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based):
    /// `backoff_ms * backoff_multiplier^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.backoff_multiplier).saturating_pow(exponent);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// One capability invocation inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub capability_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

impl Step {
    /// Creates a step with a fresh id, no dependencies and the default
    /// retry policy.
    pub fn new(capability_name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            capability_name: capability_name.into(),
            parameters,
            dependencies: Vec::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Run status of a plan. Survives between executions as evidence of the last
/// run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_step_index: usize,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    #[serde(default)]
    pub thought: String,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub execution_model: ExecutionModel,
    #[serde(default)]
    pub state: ExecutionState,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>, execution_model: ExecutionModel) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            thought: String::new(),
            steps,
            execution_model,
            state: ExecutionState::default(),
            metadata: Map::new(),
        }
    }

    pub fn with_thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = thought.into();
        self
    }

    /// Position of every step id in the step list.
    pub fn step_index(&self) -> BTreeMap<String, usize> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id.clone(), index))
            .collect()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }
}

/// What a capability produced for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub capability: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Value,
    pub completed_at: DateTime<Utc>,
}

/// Immutable summary of one `execute_plan` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    pub plan_id: String,
    pub status: PlanStatus,
    pub success: bool,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Outcomes in completion order, not step-list order.
    pub results: Vec<StepOutcome>,
    pub errors: Option<Vec<String>>,
    pub skipped_steps: Vec<String>,
    pub duration_ms: u64,
}
