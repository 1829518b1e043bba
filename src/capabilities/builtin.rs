//! Capabilities that ship with the engine.
//!
//! `reply` is also the planner's fallback target: unknown capabilities are
//! downgraded to it and empty plans fall back to it.

use super::context::CapabilityContext;
use super::registry::CapabilityRegistry;
use super::traits::{Capability, Outcome, ParameterSpec};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

const MAX_WAIT_MS: u64 = 60_000;

/// Produces a text reply from `text`, then `message`, then the previous
/// step's text, then the request message.
pub struct ReplyCapability;

#[async_trait]
impl Capability for ReplyCapability {
    fn name(&self) -> &str {
        "reply"
    }

    fn description(&self) -> &str {
        "Reply to the user with a text message"
    }

    fn aliases(&self) -> Vec<String> {
        vec!["respond".into(), "acknowledge".into()]
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::optional("text", "Text to send"),
            ParameterSpec::optional("message", "Original user message"),
        ]
    }

    async fn handle(&self, ctx: &CapabilityContext) -> anyhow::Result<Option<Outcome>> {
        let text = ctx
            .param_str("text")
            .or_else(|| ctx.param_str("message"))
            .map(ToString::to_string)
            .or_else(|| ctx.last_result().and_then(|r| r.text.clone()))
            .or_else(|| ctx.request.message.clone())
            .unwrap_or_default();
        Ok(Some(Outcome::text(text)))
    }
}

/// Records a note in working memory under `notes`.
pub struct ThinkCapability;

#[async_trait]
impl Capability for ThinkCapability {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Record intermediate reasoning in working memory"
    }

    fn aliases(&self) -> Vec<String> {
        vec!["analyze".into(), "reflect".into()]
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::optional("thought", "Note to record")]
    }

    async fn handle(&self, ctx: &CapabilityContext) -> anyhow::Result<Option<Outcome>> {
        let note = ctx
            .param_str("thought")
            .or_else(|| ctx.param_str("message"))
            .unwrap_or("(no thought supplied)")
            .to_string();
        ctx.working_memory
            .push("notes", Value::String(note.clone()))
            .await;
        Ok(Some(Outcome::text(note)))
    }
}

/// Sleeps for `duration_ms`. Steps without a numeric duration are skipped.
pub struct WaitCapability;

#[async_trait]
impl Capability for WaitCapability {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Pause for a number of milliseconds"
    }

    fn aliases(&self) -> Vec<String> {
        vec!["sleep".into(), "delay".into()]
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "duration_ms",
            "Milliseconds to wait (capped at one minute)",
        )]
    }

    async fn validate(&self, ctx: &CapabilityContext) -> bool {
        ctx.parameters
            .get("duration_ms")
            .and_then(Value::as_u64)
            .is_some()
    }

    async fn handle(&self, ctx: &CapabilityContext) -> anyhow::Result<Option<Outcome>> {
        let requested = ctx
            .parameters
            .get("duration_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("duration_ms must be a non-negative integer"))?;
        let waited = requested.min(MAX_WAIT_MS);
        tokio::time::sleep(Duration::from_millis(waited)).await;
        Ok(Some(
            Outcome::text(format!("waited {waited}ms")).with_data(json!({ "waited_ms": waited })),
        ))
    }
}

/// Registry holding `reply`, `think` and `wait`.
pub fn builtin_registry() -> CapabilityRegistry {
    CapabilityRegistry::new()
        .with(Arc::new(ReplyCapability))
        .with(Arc::new(ThinkCapability))
        .with(Arc::new(WaitCapability))
}
