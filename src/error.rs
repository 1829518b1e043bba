use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Planforge.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; capability handlers and plan-text
/// generators keep using `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum PlanError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Plan-text generation ────────────────────────────────────────────
    #[error("plan generation failed: {0}")]
    Generation(String),

    #[error("planning request must have a non-empty goal")]
    EmptyGoal,

    // ── Execution ───────────────────────────────────────────────────────
    #[error("step: {0}")]
    Step(#[from] StepError),

    #[error("No steps ready to execute - possible circular dependency")]
    Cycle,

    #[error("plan execution cancelled")]
    Cancelled,

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Step errors ─────────────────────────────────────────────────────────────

/// Why a single step could not produce an outcome.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("capability '{name}' not found")]
    UnknownCapability { name: String },

    #[error("capability '{capability}' failed after {attempts} attempt(s): {source}")]
    Handler {
        capability: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, PlanError>;
