use crate::style::StyleMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discrete, self-contained excerpt of the user's own prior writing.
/// Immutable once produced by segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingSample {
    pub text: String,
    pub word_count: usize,
    pub source_label: String,
}

impl WritingSample {
    pub fn new(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            text,
            word_count,
            source_label: source_label.into(),
        }
    }
}

/// Six register dimensions on a 1–10 scale, described by the model from the
/// user's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub warmth: u8,
    pub directness: u8,
    pub formality: u8,
    pub playfulness: u8,
    pub detail: u8,
    pub energy: u8,
}

impl Default for Register {
    fn default() -> Self {
        Self {
            warmth: 5,
            directness: 5,
            formality: 5,
            playfulness: 5,
            detail: 5,
            energy: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneProfile {
    pub primary: String,
    pub secondary: String,
    pub humor: String,
    pub confidence: String,
}

/// Recurring surface patterns worth reproducing in generated text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePatterns {
    pub opening_patterns: Vec<String>,
    pub closing_patterns: Vec<String>,
    pub transition_words: Vec<String>,
    pub catchphrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuality {
    /// 0–100; more samples and lower metric variance score higher.
    pub score: f64,
    pub label: String,
    pub suggestion: String,
}

/// Structured description of the user's personal writing style. Built once
/// per training run, persisted by [`ProfileStore`](crate::store::ProfileStore),
/// and read-only input to generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProfile {
    pub sample_count: usize,
    pub register: Register,
    pub tone: ToneProfile,
    pub descriptors: Vec<String>,
    pub rules: Vec<String>,
    pub anti_patterns: Vec<String>,
    pub signatures: SignaturePatterns,
    pub metrics: StyleMetrics,
    pub exemplars: Vec<WritingSample>,
    pub quality: ProfileQuality,
    pub built_at: DateTime<Utc>,
}

impl VoiceProfile {
    /// Minimal profile carrying only quantitative metrics; the builder fills
    /// in the model-described fields.
    pub fn from_metrics(sample_count: usize, metrics: StyleMetrics) -> Self {
        Self {
            sample_count,
            register: Register::default(),
            tone: ToneProfile::default(),
            descriptors: Vec::new(),
            rules: Vec::new(),
            anti_patterns: Vec::new(),
            signatures: SignaturePatterns::default(),
            metrics,
            exemplars: Vec::new(),
            quality: ProfileQuality {
                score: 0.0,
                label: "Untrained".into(),
                suggestion: "Add writing samples and rebuild the profile.".into(),
            },
            built_at: Utc::now(),
        }
    }
}
