use async_trait::async_trait;

/// Text sent to a plan-text generator: a system instruction and the user
/// turn carrying the goal and context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanPrompt {
    pub system: String,
    pub user: String,
}

impl PlanPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Anything that turns a planning prompt into plan text.
#[async_trait]
pub trait PlanTextGenerator: Send + Sync {
    /// Generator identifier used in logs.
    fn name(&self) -> &str {
        "generator"
    }

    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String>;
}

#[async_trait]
impl<T: PlanTextGenerator + ?Sized> PlanTextGenerator for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String> {
        (**self).generate(prompt).await
    }
}

#[async_trait]
impl<T: PlanTextGenerator + ?Sized> PlanTextGenerator for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, prompt: &PlanPrompt) -> anyhow::Result<String> {
        (**self).generate(prompt).await
    }
}
