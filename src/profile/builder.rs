use super::types::{
    ProfileQuality, Register, SignaturePatterns, ToneProfile, VoiceProfile, WritingSample,
};
use crate::error::{ProfileError, ReachError};
use crate::llm::client::{CompletionBackend, collect_completion};
use crate::llm::partial::strip_code_fences;
use crate::llm::types::ChatMessage;
use crate::style::{StyleMetrics, compute_metrics};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const MIN_SAMPLES: usize = 2;
/// Sample count at which the quantity half of the quality score maxes out.
const FULL_CREDIT_SAMPLES: usize = 8;
const MAX_EXEMPLARS: usize = 3;

/// Shape the model is asked to return when describing the author's style.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDescription {
    #[serde(default)]
    register: Option<Register>,
    #[serde(default)]
    tone: Option<ToneProfile>,
    #[serde(default)]
    descriptors: Vec<String>,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    anti_patterns: Vec<String>,
    #[serde(default)]
    signatures: Option<SignaturePatterns>,
}

/// Builds a [`VoiceProfile`] from writing samples: quantitative metrics come
/// from the local engine, the qualitative description (register, tone,
/// rules, signature patterns) from one completion call.
pub struct VoiceProfileBuilder {
    backend: Arc<dyn CompletionBackend>,
}

impl VoiceProfileBuilder {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn build(&self, samples: &[WritingSample]) -> Result<VoiceProfile, ReachError> {
        if samples.len() < MIN_SAMPLES {
            return Err(ProfileError::TooFewSamples(samples.len(), MIN_SAMPLES).into());
        }

        let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        let metrics = compute_metrics(&texts);
        let description = self.describe(samples).await?;
        let quality = assess_quality(samples, &metrics);
        let exemplars = pick_exemplars(samples, &metrics);

        Ok(VoiceProfile {
            sample_count: samples.len(),
            register: description.register.unwrap_or_default(),
            tone: description.tone.unwrap_or_default(),
            descriptors: description.descriptors,
            rules: description.rules,
            anti_patterns: description.anti_patterns,
            signatures: description.signatures.unwrap_or_default(),
            metrics,
            exemplars,
            quality,
            built_at: Utc::now(),
        })
    }

    async fn describe(&self, samples: &[WritingSample]) -> Result<ModelDescription, ReachError> {
        let messages = vec![
            ChatMessage::system(describe_system_prompt()),
            ChatMessage::user(numbered_samples(samples)),
        ];
        let stream = self
            .backend
            .stream_chat(&messages, None, CancellationToken::new())
            .await
            .map_err(ReachError::Llm)?;
        let response = collect_completion(stream).await.map_err(ReachError::Llm)?;

        let cleaned = strip_code_fences(&response);
        serde_json::from_str::<ModelDescription>(cleaned)
            .map_err(|e| ProfileError::BadDescription(e.to_string()).into())
    }
}

fn describe_system_prompt() -> String {
    r#"You are a writing-style analyst. Study the numbered writing samples and describe the author's voice.
Respond with ONLY a JSON object in this exact shape:
{
  "register": {"warmth": 1-10, "directness": 1-10, "formality": 1-10, "playfulness": 1-10, "detail": 1-10, "energy": 1-10},
  "tone": {"primary": "...", "secondary": "...", "humor": "...", "confidence": "..."},
  "descriptors": ["3-6 adjectives for the voice"],
  "rules": ["concrete dos the author always follows"],
  "antiPatterns": ["things this author would never write"],
  "signatures": {"openingPatterns": [], "closingPatterns": [], "transitionWords": [], "catchphrases": []}
}"#
        .to_string()
}

fn numbered_samples(samples: &[WritingSample]) -> String {
    samples
        .iter()
        .enumerate()
        .map(|(i, sample)| format!("Sample {}:\n{}", i + 1, sample.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// More samples and lower per-sample metric variance score higher.
fn assess_quality(samples: &[WritingSample], overall: &StyleMetrics) -> ProfileQuality {
    let quantity = (samples.len().min(FULL_CREDIT_SAMPLES) as f64
        / FULL_CREDIT_SAMPLES as f64)
        * 60.0;

    let per_sample: Vec<StyleMetrics> = samples
        .iter()
        .map(|s| compute_metrics(&[s.text.as_str()]))
        .collect();
    let sentence_spread = spread(&per_sample, |m| m.avg_sentence_length, 8.0);
    let formality_spread = spread(&per_sample, |m| m.formality_score, 25.0);
    let instability = f64::midpoint(sentence_spread, formality_spread);
    let stability = (1.0 - instability) * 40.0;

    let score = (quantity + stability).clamp(0.0, 100.0);
    let label = if score >= 80.0 {
        "Excellent"
    } else if score >= 60.0 {
        "Good"
    } else if score >= 40.0 {
        "Fair"
    } else {
        "Limited"
    };

    let suggestion = if samples.len() < 5 {
        "Add more writing samples to sharpen the profile.".to_string()
    } else if instability > 0.5 {
        "Samples vary widely in style; prefer samples from one writing context.".to_string()
    } else if overall.low_confidence {
        "Samples are very short; longer excerpts will ground the metrics better.".to_string()
    } else {
        "Profile is well grounded; rebuild after major writing-style changes.".to_string()
    };

    ProfileQuality {
        score,
        label: label.to_string(),
        suggestion,
    }
}

/// Normalized standard deviation of one metric across samples, 0–1.
fn spread(per_sample: &[StyleMetrics], metric: impl Fn(&StyleMetrics) -> f64, scale: f64) -> f64 {
    let values: Vec<f64> = per_sample.iter().map(metric).collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (variance.sqrt() / scale).clamp(0.0, 1.0)
}

/// Keeps the samples whose sentence rhythm is closest to the aggregate:
/// the most representative excerpts to quote back at the model.
fn pick_exemplars(samples: &[WritingSample], overall: &StyleMetrics) -> Vec<WritingSample> {
    let mut ranked: Vec<(f64, &WritingSample)> = samples
        .iter()
        .map(|sample| {
            let own = compute_metrics(&[sample.text.as_str()]);
            let distance = (own.avg_sentence_length - overall.avg_sentence_length).abs();
            (distance, sample)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(MAX_EXEMPLARS)
        .map(|(_, sample)| sample.clone())
        .collect()
}
