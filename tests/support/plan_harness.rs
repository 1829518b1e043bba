#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use planforge::capabilities::{Capability, CapabilityContext, CapabilityRegistry, Outcome};
use planforge::llm::{PlanPrompt, PlanTextGenerator};
use planforge::observability::{PlanEvent, PlanObserver};
use planforge::planner::{RetryPolicy, Step};
use serde_json::Map;
use tokio::time::Instant;

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PlanEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlanEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Step ids of every wave, in wave order.
    pub fn waves(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlanEvent::WaveStarted { step_ids, .. } => Some(step_ids),
                _ => None,
            })
            .collect()
    }

    /// `(attempt, delay)` of every retry.
    pub fn retries(&self) -> Vec<(u32, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PlanEvent::StepRetry { attempt, delay, .. } => Some((attempt, delay)),
                _ => None,
            })
            .collect()
    }

    pub fn saw_cancel(&self) -> bool {
        self.events()
            .iter()
            .any(|event| matches!(event, PlanEvent::PlanCancelled { .. }))
    }
}

impl PlanObserver for RecordingObserver {
    fn on_event(&self, event: &PlanEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub step_id: String,
    pub at: Instant,
    /// How many results the step could see when it ran
    pub results_seen: usize,
}

/// Capability whose behavior is fixed up front.
pub struct ScriptedCapability {
    name: String,
    failures: u32,
    accept: bool,
    skip: bool,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedCapability {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failures: 0,
            accept: true,
            skip: false,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    pub fn failing(name: &str, failures: u32) -> Self {
        Self {
            failures,
            ..Self::ok(name)
        }
    }

    pub fn broken(name: &str) -> Self {
        Self::failing(name, u32::MAX)
    }

    pub fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }

    pub fn skipping(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, _ctx: &CapabilityContext) -> bool {
        self.accept
    }

    async fn handle(&self, ctx: &CapabilityContext) -> anyhow::Result<Option<Outcome>> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                step_id: ctx.step_id.clone(),
                at: Instant::now(),
                results_seen: ctx.results.len(),
            });
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if u32::try_from(call_index).unwrap_or(u32::MAX) < self.failures {
            anyhow::bail!("{} failed on call {}", self.name, call_index + 1);
        }
        if self.skip {
            return Ok(None);
        }
        Ok(Some(Outcome::text(format!("{} done", self.name))))
    }
}

pub fn registry_with(capabilities: &[Arc<ScriptedCapability>]) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    for capability in capabilities {
        registry.register(Arc::clone(capability) as Arc<dyn Capability>);
    }
    registry
}

/// Step with a fixed id and no retries.
pub fn step(id: &str, capability: &str, deps: &[&str]) -> Step {
    let mut step = Step::new(capability, Map::new())
        .with_dependencies(deps.iter().map(ToString::to_string).collect())
        .with_retry_policy(RetryPolicy::none());
    step.id = id.to_string();
    step
}

/// Generator that replays queued replies and records prompts.
#[derive(Default)]
pub struct QueueGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<PlanPrompt>>,
}

impl QueueGenerator {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|reply| reply.map(ToString::to_string).map_err(ToString::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<PlanPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanTextGenerator for QueueGenerator {
    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(error)) => Err(anyhow::anyhow!(error)),
            None => Err(anyhow::anyhow!("no reply queued")),
        }
    }
}
