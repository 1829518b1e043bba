use crate::capabilities::context::CapabilityContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a capability produced. `text` is the human-readable part; `data` is
/// anything structured later steps may want to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub text: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// One declared parameter of a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

/// Description of a capability for prompts and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
}

/// Anything a plan step can invoke
#[async_trait]
pub trait Capability: Send + Sync {
    /// Primary name, matched after normalization
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Alternative names that resolve to this capability
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }

    /// Declared parameters
    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Returning `false` skips the step: no result and no error.
    async fn validate(&self, _ctx: &CapabilityContext) -> bool {
        true
    }

    /// Run the capability. `Ok(None)` means the capability chose to skip.
    async fn handle(&self, ctx: &CapabilityContext) -> anyhow::Result<Option<Outcome>>;

    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            aliases: self.aliases(),
            parameters: self.parameters(),
        }
    }
}
