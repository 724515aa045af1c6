use super::metrics::{StyleMetrics, compute_metrics};
use crate::config::{MatchTolerances, MatchWeights};
use serde::{Deserialize, Serialize};

/// Similarity between a candidate message's measured style and a target
/// voice profile's metrics. Recomputed whenever the message changes; a pure
/// function of the current text and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMatchResult {
    /// 0–100 weighted overall closeness.
    pub score: f64,
    pub breakdown: MatchBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchBreakdown {
    pub sentence_length: f64,
    pub formality: f64,
    pub contractions: f64,
    pub readability: f64,
    pub pronouns: f64,
    pub punctuation: f64,
}

impl MatchBreakdown {
    fn neutral() -> Self {
        Self {
            sentence_length: 50.0,
            formality: 50.0,
            contractions: 50.0,
            readability: 50.0,
            pronouns: 50.0,
            punctuation: 50.0,
        }
    }

    /// Dimensions scoring under the refinement threshold, for the
    /// corrective second prompt.
    pub fn weak_dimensions(&self) -> Vec<(&'static str, f64)> {
        let all = [
            ("sentence length", self.sentence_length),
            ("formality", self.formality),
            ("contraction usage", self.contractions),
            ("readability", self.readability),
            ("pronoun usage", self.pronouns),
            ("punctuation", self.punctuation),
        ];
        all.into_iter().filter(|(_, score)| *score < 70.0).collect()
    }
}

/// Scores how closely `message` matches the `target` style.
///
/// Each dimension gets full marks at exact match and degrades linearly as
/// the absolute difference approaches that dimension's tolerance band. A
/// candidate too short to measure reliably gets the neutral breakdown
/// instead of a noisy extreme.
pub fn score_voice_match(
    message: &str,
    target: &StyleMetrics,
    weights: &MatchWeights,
    tolerances: &MatchTolerances,
) -> VoiceMatchResult {
    let candidate = compute_metrics(&[message]);
    if candidate.low_confidence {
        return VoiceMatchResult {
            score: 50.0,
            breakdown: MatchBreakdown::neutral(),
        };
    }

    let breakdown = MatchBreakdown {
        sentence_length: closeness(
            candidate.avg_sentence_length,
            target.avg_sentence_length,
            tolerances.sentence_length,
        ),
        formality: closeness(
            candidate.formality_score,
            target.formality_score,
            tolerances.formality,
        ),
        contractions: closeness(
            candidate.contraction_rate,
            target.contraction_rate,
            tolerances.contractions,
        ),
        readability: closeness(
            candidate.readability_score,
            target.readability_score,
            tolerances.readability,
        ),
        pronouns: closeness(
            candidate.pronoun_rate,
            target.pronoun_rate,
            tolerances.pronouns,
        ),
        punctuation: closeness(
            candidate.question_rate + candidate.exclamation_rate,
            target.question_rate + target.exclamation_rate,
            tolerances.punctuation * 2.0,
        ),
    };

    let score = breakdown.sentence_length * weights.sentence_length
        + breakdown.formality * weights.formality
        + breakdown.contractions * weights.contractions
        + breakdown.readability * weights.readability
        + breakdown.pronouns * weights.pronouns
        + breakdown.punctuation * weights.punctuation;

    VoiceMatchResult {
        score: score.clamp(0.0, 100.0),
        breakdown,
    }
}

fn closeness(candidate: f64, target: f64, tolerance: f64) -> f64 {
    let difference = (candidate - target).abs();
    ((1.0 - difference / tolerance).max(0.0) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "I spent the weekend rebuilding our ingest pipeline, and honestly it \
        was overdue. The old one dropped events whenever traffic spiked past a few thousand a \
        second. The new design buffers to disk first, which costs latency but saves the data. \
        I would rather explain a slow dashboard than a missing week of metrics.";

    fn defaults() -> (MatchWeights, MatchTolerances) {
        (MatchWeights::default(), MatchTolerances::default())
    }

    #[test]
    fn identical_text_scores_near_perfect() {
        let (weights, tolerances) = defaults();
        let target = compute_metrics(&[SAMPLE]);
        let result = score_voice_match(SAMPLE, &target, &weights, &tolerances);
        assert!(result.score > 95.0, "score {}", result.score);
        assert!(result.breakdown.sentence_length > 99.0);
        assert!(result.breakdown.formality > 99.0);
    }

    #[test]
    fn deterministic_across_calls() {
        let (weights, tolerances) = defaults();
        let target = compute_metrics(&[SAMPLE]);
        let message = "Quick note: your pipeline talk was great. I rebuilt ours last month \
            and hit the same wall you described. Happy to compare notes if useful.";
        let first = score_voice_match(message, &target, &weights, &tolerances);
        let second = score_voice_match(message, &target, &weights, &tolerances);
        assert_eq!(first, second);
    }

    #[test]
    fn mismatched_style_scores_lower_than_matched() {
        let (weights, tolerances) = defaults();
        let target = compute_metrics(&[SAMPLE]);

        let matched = "I noticed your post about event buffering, and it matched what we saw \
            in production last quarter. Our queue dropped spikes too until we moved the write \
            path to disk. I would trade a little latency for complete data every time.";
        let mismatched = "Greetings!!! Amazing opportunity awaits! Synergistic collaboration \
            frameworks!!! Revolutionary paradigm!!! Connect now!!! Act fast!!! Don't wait!!! \
            Limited slots!!! Incredible value!!! Join today!!!";

        let matched_score = score_voice_match(matched, &target, &weights, &tolerances).score;
        let mismatched_score = score_voice_match(mismatched, &target, &weights, &tolerances).score;
        assert!(
            matched_score > mismatched_score,
            "{matched_score} vs {mismatched_score}"
        );
    }

    #[test]
    fn short_candidate_falls_back_to_neutral() {
        let (weights, tolerances) = defaults();
        let target = compute_metrics(&[SAMPLE]);
        let result = score_voice_match("Too short.", &target, &weights, &tolerances);
        assert!((result.score - 50.0).abs() < f64::EPSILON);
        assert_eq!(result.breakdown, MatchBreakdown::neutral());
    }

    #[test]
    fn empty_candidate_does_not_panic() {
        let (weights, tolerances) = defaults();
        let target = compute_metrics(&[SAMPLE]);
        let result = score_voice_match("", &target, &weights, &tolerances);
        assert!((result.score - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weak_dimensions_lists_only_scores_under_threshold() {
        let breakdown = MatchBreakdown {
            sentence_length: 90.0,
            formality: 65.0,
            contractions: 40.0,
            readability: 70.0,
            pronouns: 85.0,
            punctuation: 69.9,
        };
        let weak = breakdown.weak_dimensions();
        let names: Vec<&str> = weak.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["formality", "contraction usage", "punctuation"]);
    }

    #[test]
    fn closeness_degrades_with_distance() {
        assert!((closeness(10.0, 10.0, 5.0) - 100.0).abs() < f64::EPSILON);
        assert!((closeness(12.5, 10.0, 5.0) - 50.0).abs() < f64::EPSILON);
        assert!((closeness(20.0, 10.0, 5.0) - 0.0).abs() < f64::EPSILON);
    }
}
