use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `warmreach`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ReachError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Completion backend ────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Voice profile ───────────────────────────────────────────────────
    #[error("profile: {0}")]
    Profile(#[from] ProfileError),

    // ── Storage collaborators ───────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── LLM / Completion errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion API key not set")]
    MissingApiKey,

    #[error("model {model} request failed: {message}")]
    Request { model: String, message: String },

    #[error("all {attempts} candidate models failed, last error: {last}")]
    AllModelsFailed { attempts: usize, last: String },

    #[error("streaming error: {0}")]
    Streaming(String),

    #[error("generation cancelled")]
    Cancelled,
}

impl LlmError {
    /// Cancellation is not a failure from the user's perspective; it must
    /// bypass retry and error-display logic.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}

// ─── Voice profile errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("not enough usable writing samples ({0} found, need at least {1})")]
    TooFewSamples(usize, usize),

    #[error("model returned an unusable profile description: {0}")]
    BadDescription(String),

    #[error("segmentation produced no samples from source \"{0}\"")]
    EmptySegmentation(String),
}

// ─── Storage errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value backend failed: {0}")]
    Backend(String),

    #[error("record {0} could not be decoded: {1}")]
    Decode(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_wraps_into_reach_error() {
        let err: ReachError = LlmError::MissingApiKey.into();
        assert!(matches!(err, ReachError::Llm(LlmError::MissingApiKey)));
        assert_eq!(err.to_string(), "llm: completion API key not set");
    }

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(LlmError::Cancelled.is_cancelled());
        assert!(
            !LlmError::Request {
                model: "m".into(),
                message: "boom".into()
            }
            .is_cancelled()
        );
    }

    #[test]
    fn all_models_failed_names_last_failure() {
        let err = LlmError::AllModelsFailed {
            attempts: 3,
            last: "503 Service Unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 candidate models"));
        assert!(msg.contains("503 Service Unavailable"));
    }
}
