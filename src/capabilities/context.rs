//! Invocation context handed to capabilities.

use crate::planner::StepOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Caller-supplied context for one execution: the triggering message and any
/// free-form values the caller wants capabilities to see.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl RequestContext {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            values: Map::new(),
        }
    }
}

/// Scratch map shared by every step of one execution.
///
/// Steps in the same wave may write concurrently; all access goes through
/// the mutex.
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.get(key).cloned()
    }

    pub async fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.lock().await.insert(key.into(), value)
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.remove(key)
    }

    /// Appends `value` to the array stored under `key`, creating it if needed.
    /// A non-array value under `key` is replaced.
    pub async fn push(&self, key: &str, value: Value) {
        let mut guard = self.inner.lock().await;
        match guard.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            _ => {
                guard.insert(key.to_string(), Value::Array(vec![value]));
            }
        }
    }

    pub async fn snapshot(&self) -> Map<String, Value> {
        self.inner.lock().await.clone()
    }
}

/// Everything a capability sees when it runs.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    pub plan_id: String,
    pub step_id: String,
    /// The step's own parameters
    pub parameters: Map<String, Value>,
    /// Every result accumulated so far in this execution, not only those of
    /// the step's direct dependencies.
    pub results: Vec<StepOutcome>,
    pub request: Arc<RequestContext>,
    pub working_memory: WorkingMemory,
}

impl CapabilityContext {
    /// A context outside of any plan execution.
    pub fn detached(step_id: impl Into<String>) -> Self {
        Self {
            plan_id: String::new(),
            step_id: step_id.into(),
            parameters: Map::new(),
            results: Vec::new(),
            request: Arc::new(RequestContext::default()),
            working_memory: WorkingMemory::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn last_result(&self) -> Option<&StepOutcome> {
        self.results.last()
    }
}
