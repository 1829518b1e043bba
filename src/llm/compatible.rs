//! Plan-text generator for any OpenAI-compatible `/chat/completions`
//! endpoint.

use super::traits::{PlanPrompt, PlanTextGenerator};
use crate::config::ModelConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 200;

pub struct CompatibleGenerator {
    pub(crate) model: String,
    pub(crate) api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
    /// Pre-computed chat completions URL
    chat_url: String,
    client: Client,
}

impl CompatibleGenerator {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let chat_url = if base_url.ends_with("chat/completions") {
            base_url.to_string()
        } else {
            format!("{base_url}/chat/completions")
        };

        Self {
            model: model.to_string(),
            api_key: api_key.map(ToString::to_string),
            temperature: 0.3,
            max_tokens: 2000,
            chat_url,
            client: build_client(60),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        let mut generator = Self::new(&config.base_url, config.api_key.as_deref(), &config.model)
            .with_sampling(config.temperature, config.max_tokens);
        generator.client = build_client(config.timeout_secs);
        generator
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn chat_completions_url(&self) -> &str {
        &self.chat_url
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Truncates an upstream error body so it can go into logs.
fn truncate_api_error(input: &str) -> String {
    if input.chars().count() <= MAX_API_ERROR_CHARS {
        return input.to_string();
    }
    let end = input
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(input.len(), |(index, _)| index);
    format!("{}...", &input[..end])
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl PlanTextGenerator for CompatibleGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("API key not set. Set model.api_key or PLANFORGE_API_KEY.");
        };

        let mut messages = Vec::with_capacity(2);
        if !prompt.system.is_empty() {
            messages.push(Message {
                role: "system",
                content: &prompt.system,
            });
        }
        messages.push(Message {
            role: "user",
            content: &prompt.user,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.chat_completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("chat completions request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            anyhow::bail!("API error ({status}): {}", truncate_api_error(&body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("chat completions JSON decode failed")?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No plan text in response from {}", self.model))
    }
}
