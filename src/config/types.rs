use crate::error::ConfigError;
use crate::planner::{ExecutionModel, ParallelFailurePolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Capability used for fallback steps and downgraded unknown capabilities
    #[serde(default = "default_capability")]
    pub default_capability: String,
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
    #[serde(default = "default_adapt_fallback_text")]
    pub adapt_fallback_text: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub default_execution_model: ExecutionModel,
}

fn default_capability() -> String {
    "reply".into()
}

fn default_fallback_text() -> String {
    "I will help you with this request step by step.".into()
}

fn default_adapt_fallback_text() -> String {
    "Plan adapted: completing with available results.".into()
}

fn default_max_steps() -> usize {
    10
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_capability: default_capability(),
            fallback_text: default_fallback_text(),
            adapt_fallback_text: default_adapt_fallback_text(),
            max_steps: default_max_steps(),
            default_execution_model: ExecutionModel::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Retry policy given to steps the planner creates
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub parallel_failures: ParallelFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backend() -> String {
    "log".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            log_level: default_log_level(),
        }
    }
}

impl ObservabilityConfig {
    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(self.log_level.trim()).map_err(|_| {
            ConfigError::Validation(format!(
                "observability.log_level '{}' is not a tracing level",
                self.log_level
            ))
        })
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planner.default_capability.trim().is_empty() {
            return Err(ConfigError::Validation(
                "planner.default_capability cannot be empty".into(),
            ));
        }
        if self.planner.max_steps == 0 {
            return Err(ConfigError::Validation(
                "planner.max_steps must be at least 1".into(),
            ));
        }
        if self.executor.retry.backoff_multiplier == 0 {
            return Err(ConfigError::Validation(
                "executor.retry.backoff_multiplier must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Validation(format!(
                "model.temperature {} is outside 0.0..=2.0",
                self.model.temperature
            )));
        }
        self.observability.level()?;
        Ok(())
    }
}
