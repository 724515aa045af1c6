use crate::config::AuthenticityWeights;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Heuristic estimate of how generic/LLM-typical a text reads, independent
/// of voice matching. Directional signal, not ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiScoreResult {
    /// 0–100; higher reads more AI-generated.
    pub score: f64,
    pub label: String,
    pub breakdown: AiBreakdown,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiBreakdown {
    pub compression: f64,
    pub phrases: f64,
    pub structure: f64,
    pub hedging: f64,
}

const MIN_ANALYZABLE_CHARS: usize = 20;
const TOO_SHORT_LABEL: &str = "Too short to analyze";

/// Per-occurrence increment for the cliché phrase signal.
const PHRASE_INCREMENT: f64 = 25.0;
/// Texts under this many characters get a neutral compression score.
const MIN_COMPRESSION_CHARS: usize = 50;
const NEUTRAL_COMPRESSION: f64 = 50.0;
/// Structure default when there are too few sentences to measure variation.
const DEFAULT_STRUCTURE: f64 = 30.0;
/// Coefficient of variation at which sentence rhythm stops looking machine-flat.
const STRUCTURE_CV_CEILING: f64 = 0.45;
/// Points per hedge-occurrence per 100 words.
const HEDGING_DENSITY_SCALE: f64 = 25.0;

const CLICHE_PHRASES: &[&str] = &[
    "i hope this message finds you well",
    "i hope this email finds you well",
    "hope you're doing well",
    "hope you are doing well",
    "i came across your profile",
    "i wanted to reach out",
    "i'd love to connect",
    "i would love to connect",
    "quick question for you",
    "touch base",
    "circle back",
    "synergy",
    "synergies",
    "leverage",
    "win-win",
    "game changer",
    "game-changing",
    "cutting-edge",
    "in today's fast-paced world",
    "unlock the potential",
    "take it to the next level",
];

const HEDGE_WORDS: &[&str] = &["perhaps", "maybe", "might", "possibly", "arguably", "potentially"];

const HEDGE_PHRASES: &[&str] = &[
    "i think",
    "i believe",
    "i feel like",
    "i guess",
    "it seems",
    "sort of",
    "kind of",
    "could be",
    "might consider",
    "in my opinion",
];

/// Scores `text` for AI-ness across four independently weighted signals.
///
/// Pure and deterministic; degraded inputs return fixed defaults rather
/// than unreliable extremes.
pub fn score_authenticity(text: &str, weights: &AuthenticityWeights) -> AiScoreResult {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_ANALYZABLE_CHARS {
        return AiScoreResult {
            score: 0.0,
            label: TOO_SHORT_LABEL.to_string(),
            breakdown: AiBreakdown::default(),
            suggestions: Vec::new(),
        };
    }

    let lowered = trimmed.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let breakdown = AiBreakdown {
        compression: compression_signal(trimmed, &words),
        phrases: phrase_signal(&lowered),
        structure: structure_signal(trimmed),
        hedging: hedging_signal(&lowered, &words),
    };

    let score = (breakdown.compression * weights.compression
        + breakdown.phrases * weights.phrases
        + breakdown.structure * weights.structure
        + breakdown.hedging * weights.hedging)
        .clamp(0.0, 100.0);

    AiScoreResult {
        score,
        label: label_for(score).to_string(),
        suggestions: suggestions_for(&breakdown),
        breakdown,
    }
}

fn label_for(score: f64) -> &'static str {
    if score <= 20.0 {
        "Very human"
    } else if score <= 40.0 {
        "Mostly human"
    } else if score <= 60.0 {
        "Somewhat AI"
    } else if score <= 80.0 {
        "Likely AI"
    } else {
        "Very AI"
    }
}

/// Type-token ratio plus bigram uniqueness; low diversity reads compressed
/// and formulaic.
fn compression_signal(text: &str, words: &[&str]) -> f64 {
    if text.chars().count() < MIN_COMPRESSION_CHARS || words.len() < 2 {
        return NEUTRAL_COMPRESSION;
    }

    let cleaned: Vec<String> = words
        .iter()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();
    if cleaned.len() < 2 {
        return NEUTRAL_COMPRESSION;
    }

    let unique: HashSet<&str> = cleaned.iter().map(String::as_str).collect();
    let ttr = unique.len() as f64 / cleaned.len() as f64;

    let bigrams: Vec<String> = cleaned.windows(2).map(|pair| pair.join(" ")).collect();
    let unique_bigrams: HashSet<&str> = bigrams.iter().map(String::as_str).collect();
    let bigram_uniqueness = unique_bigrams.len() as f64 / bigrams.len() as f64;

    ((1.0 - ttr) * 60.0 + (1.0 - bigram_uniqueness) * 40.0).clamp(0.0, 100.0)
}

/// Counts occurrences of stock opener and filler phrases.
fn phrase_signal(lowered: &str) -> f64 {
    let mut matches = 0usize;
    for phrase in CLICHE_PHRASES {
        matches += lowered.matches(phrase).count();
    }
    (matches as f64 * PHRASE_INCREMENT).min(100.0)
}

/// Coefficient of variation of sentence lengths; machine-flat rhythm (every
/// sentence the same length) scores high.
fn structure_signal(text: &str) -> f64 {
    let lengths: Vec<usize> = text
        .split(['.', '!', '?', '\n'])
        .map(|s| s.split_whitespace().count())
        .filter(|len| *len > 0)
        .collect();
    if lengths.len() < 3 {
        return DEFAULT_STRUCTURE;
    }

    let n = lengths.len() as f64;
    let mean = lengths.iter().sum::<usize>() as f64 / n;
    let variance = lengths
        .iter()
        .map(|len| {
            let diff = *len as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let cv = variance.sqrt() / mean;

    (((STRUCTURE_CV_CEILING - cv) / STRUCTURE_CV_CEILING) * 100.0).clamp(0.0, 100.0)
}

/// Density of hedging qualifiers per 100 words, scaled up.
fn hedging_signal(lowered: &str, words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }

    let mut occurrences = 0usize;
    for word in words {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        if HEDGE_WORDS.contains(&cleaned) {
            occurrences += 1;
        }
    }
    for phrase in HEDGE_PHRASES {
        occurrences += lowered.matches(phrase).count();
    }

    let per_hundred = occurrences as f64 / words.len() as f64 * 100.0;
    (per_hundred * HEDGING_DENSITY_SCALE).min(100.0)
}

fn suggestions_for(breakdown: &AiBreakdown) -> Vec<String> {
    let mut suggestions = Vec::with_capacity(4);
    if breakdown.phrases > 40.0 {
        suggestions.push(
            "Remove stock phrases like \"I hope this message finds you well\"; open with \
             something specific to the recipient instead."
                .to_string(),
        );
    }
    if breakdown.structure > 60.0 {
        suggestions.push(
            "Vary your sentence lengths; uniform rhythm reads machine-generated.".to_string(),
        );
    }
    if breakdown.hedging > 50.0 {
        suggestions.push(
            "Cut hedging qualifiers (perhaps, might, I think) and state your point directly."
                .to_string(),
        );
    }
    if breakdown.compression > 60.0 {
        suggestions.push(
            "Reword repeated phrases; the same constructions recur throughout.".to_string(),
        );
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> AiScoreResult {
        score_authenticity(text, &AuthenticityWeights::default())
    }

    #[test]
    fn empty_text_is_too_short() {
        let result = score("");
        assert!((result.score - 0.0).abs() < f64::EPSILON);
        assert_eq!(result.label, TOO_SHORT_LABEL);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn under_twenty_chars_is_too_short() {
        let result = score("Hi there, quick q");
        assert!((result.score - 0.0).abs() < f64::EPSILON);
        assert_eq!(result.label, TOO_SHORT_LABEL);
    }

    #[test]
    fn deterministic_across_calls() {
        let text = "I read your write-up on query planning twice. The section on join \
            reordering matched a bug we chased for a month. Happy to swap war stories.";
        assert_eq!(score(text), score(text));
    }

    #[test]
    fn three_distinct_cliches_push_phrases_past_75() {
        let text = "We should circle back about the synergy here, and I wanted to reach out \
            directly because the timing felt right for both of our teams this quarter.";
        let result = score(text);
        assert!(
            result.breakdown.phrases >= 75.0,
            "phrases {}",
            result.breakdown.phrases
        );
    }

    #[test]
    fn formulaic_uniform_message_reads_ai() {
        // 100+ words, the canonical stock opener, every sentence within two
        // words of the mean length.
        let text = "I hope this message finds you well and that your week is going smoothly. \
            I think your recent post about scaling modern data pipelines was insightful and timely. \
            I wanted to reach out because our teams might benefit from a quick conversation. \
            Perhaps we could leverage our shared experience to unlock the potential of both platforms. \
            I believe a short call might be a genuinely productive way to touch base. \
            Maybe we could also circle back on the integration topic you mentioned earlier. \
            I think this opportunity could be a true win-win for everyone involved here. \
            Possibly we could schedule something for early next week if that works well.";
        assert!(text.split_whitespace().count() >= 100);

        let result = score(text);
        assert!(result.score >= 60.0, "score {}", result.score);
        assert!(
            result.label == "Somewhat AI" || result.label == "Likely AI" || result.label == "Very AI",
            "label {}",
            result.label
        );
        assert!(result.breakdown.phrases >= 75.0);
        assert!(result.breakdown.structure >= 60.0);
    }

    #[test]
    fn specific_human_text_reads_human() {
        let text = "Saw the outage postmortem you published Tuesday. We hit that exact \
            kernel bug in March; took us nine days. Your timeline cut ours in half, \
            seriously. If you ever write up the socket-draining trick, send it my way?";
        let result = score(text);
        assert!(result.score <= 40.0, "score {}", result.score);
    }

    #[test]
    fn uniform_sentences_score_structure_high() {
        let text = "The report covers every region we track. The numbers show steady \
            growth in all areas. The teams delivered each milestone right on time. \
            The budget stayed within planned limits all year.";
        let result = score(text);
        assert!(
            result.breakdown.structure > 70.0,
            "structure {}",
            result.breakdown.structure
        );
    }

    #[test]
    fn few_sentences_get_structure_default() {
        let text = "One decent sentence about the project. Another one right after it.";
        let result = score(text);
        assert!((result.breakdown.structure - DEFAULT_STRUCTURE).abs() < f64::EPSILON);
    }

    #[test]
    fn short_text_gets_neutral_compression() {
        // Over 20 chars (analyzable) but under the 50-char compression floor.
        let result = score("Nice talk! Loved the demo, truly.");
        assert!((result.breakdown.compression - NEUTRAL_COMPRESSION).abs() < f64::EPSILON);
    }

    #[test]
    fn hedging_density_scales() {
        let hedgy = "Perhaps we might consider this, and maybe it could be worth a look. \
            I think it might possibly help, though arguably it sort of depends.";
        let direct = "We tested the patch on staging. It fixed the leak. Deploy it \
            tomorrow morning and watch the memory graphs closely.";
        assert!(score(hedgy).breakdown.hedging > score(direct).breakdown.hedging);
    }

    #[test]
    fn suggestions_track_breakdown_and_cap_at_four() {
        let result = score(
            "I hope this message finds you well. Perhaps we might leverage a synergy here. \
            Maybe we could circle back and touch base about the win-win potential soon. \
            I think this might possibly be a game changer for both of our teams. \
            Perhaps the synergy could maybe unlock the potential we both clearly want.",
        );
        assert!(!result.suggestions.is_empty());
        assert!(result.suggestions.len() <= 4);
        assert!(result.suggestions[0].contains("stock phrases"));
    }

    #[test]
    fn labels_map_fixed_thresholds() {
        assert_eq!(label_for(0.0), "Very human");
        assert_eq!(label_for(20.0), "Very human");
        assert_eq!(label_for(40.0), "Mostly human");
        assert_eq!(label_for(60.0), "Somewhat AI");
        assert_eq!(label_for(80.0), "Likely AI");
        assert_eq!(label_for(81.0), "Very AI");
    }
}
