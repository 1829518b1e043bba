use super::traits::{PlanPrompt, PlanTextGenerator};
use async_trait::async_trait;
use std::time::Duration;

/// Client errors other than 408/429 will not go away on retry.
fn is_non_retryable(err: &anyhow::Error) -> bool {
    if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>()
        && let Some(status) = reqwest_err.status()
    {
        let code = status.as_u16();
        return status.is_client_error() && code != 429 && code != 408;
    }
    let msg = err.to_string();
    if msg.contains("API key not set") {
        return true;
    }
    for word in msg.split(|c: char| !c.is_ascii_digit()) {
        if let Ok(code) = word.parse::<u16>()
            && (400..500).contains(&code)
        {
            return code != 429 && code != 408;
        }
    }
    false
}

/// Generator wrapper that retries transient failures with doubling backoff.
pub struct ReliableGenerator<G> {
    inner: G,
    max_retries: u32,
    base_backoff_ms: u64,
}

impl<G: PlanTextGenerator> ReliableGenerator<G> {
    pub fn new(inner: G, max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            base_backoff_ms,
        }
    }
}

#[async_trait]
impl<G: PlanTextGenerator> PlanTextGenerator for ReliableGenerator<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String> {
        let mut backoff_ms = self.base_backoff_ms;
        let mut attempt = 0;

        loop {
            match self.inner.generate(prompt).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(
                            generator = self.inner.name(),
                            attempt,
                            "Generator recovered after retries"
                        );
                    }
                    return Ok(text);
                }
                Err(err) => {
                    if is_non_retryable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(
                        generator = self.inner.name(),
                        attempt,
                        backoff_ms,
                        "Generator call failed, retrying: {err}"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(10_000);
                }
            }
        }
    }
}
