use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

/// Host-injected engine configuration.
///
/// The host process owns mutable global state (API key, message-length
/// preference, model list) and passes it in explicitly when constructing the
/// orchestrator. Nothing in the library reads ambient globals, so the state
/// machine is unit-testable without a host environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub message_length: MessageLength,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion.models.is_empty() {
            return Err(ConfigError::Validation(
                "completion.models must list at least one model".into(),
            ));
        }
        self.scoring.voice_match.validate()?;
        self.scoring.tolerances.validate()?;
        self.scoring.authenticity.validate()?;
        Ok(())
    }
}

// ── Completion backend ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Bearer key for the chat-completions endpoint. `None` fails fast with
    /// `LlmError::MissingApiKey` on the first call.
    pub api_key: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Ordered fallback list. A per-call override is tried first, then these.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}

fn default_models() -> Vec<String> {
    vec![
        "anthropic/claude-3.5-haiku".into(),
        "openai/gpt-4o-mini".into(),
        "meta-llama/llama-3.3-70b-instruct".into(),
    ]
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            models: default_models(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ── Timing / retry ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay between a generation request and the network call actually
    /// firing. A second request for the same angle within the window is
    /// dropped, not queued.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff: attempt n sleeps `base * 2^n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor).min(30_000))
    }
}

// ── Message length tiers ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLength {
    #[default]
    Short,
    Medium,
    Long,
}

impl MessageLength {
    /// Inclusive word-count band given to the model.
    pub fn word_range(self) -> (u32, u32) {
        match self {
            MessageLength::Short => (40, 80),
            MessageLength::Medium => (100, 150),
            MessageLength::Long => (180, 250),
        }
    }
}

// ── Scoring weights (calibratable defaults, not normative constants) ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub voice_match: MatchWeights,

    #[serde(default)]
    pub tolerances: MatchTolerances,

    #[serde(default)]
    pub authenticity: AuthenticityWeights,
}

/// Per-dimension tolerance bands for the voice-match score: the absolute
/// difference at which a dimension's closeness drops to zero. Sentence
/// length tolerates far more drift than punctuation rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTolerances {
    /// Words of average-sentence-length difference.
    pub sentence_length: f64,
    /// Points on the 0–100 formality scale.
    pub formality: f64,
    /// Contractions-per-word rate difference.
    pub contractions: f64,
    /// Points on the 0–100 readability scale.
    pub readability: f64,
    /// Pronouns-per-word rate difference.
    pub pronouns: f64,
    /// Question/exclamation-per-sentence rate difference.
    pub punctuation: f64,
}

impl Default for MatchTolerances {
    fn default() -> Self {
        Self {
            sentence_length: 10.0,
            formality: 30.0,
            contractions: 0.08,
            readability: 30.0,
            pronouns: 0.10,
            punctuation: 0.05,
        }
    }
}

impl MatchTolerances {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            self.sentence_length,
            self.formality,
            self.contractions,
            self.readability,
            self.pronouns,
            self.punctuation,
        ];
        if all.iter().any(|t| *t <= 0.0) {
            return Err(ConfigError::Validation(
                "voice-match tolerances must all be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Per-dimension weights for the voice-match score. Must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchWeights {
    pub sentence_length: f64,
    pub formality: f64,
    pub contractions: f64,
    pub readability: f64,
    pub pronouns: f64,
    pub punctuation: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            sentence_length: 0.25,
            formality: 0.20,
            contractions: 0.15,
            readability: 0.15,
            pronouns: 0.15,
            punctuation: 0.10,
        }
    }
}

impl MatchWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.sentence_length
            + self.formality
            + self.contractions
            + self.readability
            + self.pronouns
            + self.punctuation;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "voice-match weights must sum to 1.0 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// Signal weights for the AI-ness score. Phrase matching dominates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticityWeights {
    pub compression: f64,
    pub phrases: f64,
    pub structure: f64,
    pub hedging: f64,
}

impl Default for AuthenticityWeights {
    fn default() -> Self {
        Self {
            compression: 0.2,
            phrases: 0.4,
            structure: 0.2,
            hedging: 0.2,
        }
    }
}

impl AuthenticityWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.compression + self.phrases + self.structure + self.hedging;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Validation(format!(
                "authenticity weights must sum to 1.0 (got {sum})"
            )));
        }
        Ok(())
    }
}
