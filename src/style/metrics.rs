use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Quantitative writing profile derived from one or more text samples.
///
/// Always recomputed fresh from text, never mutated; identical input yields
/// identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMetrics {
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub sentence_length_std_dev: f64,
    pub avg_word_length: f64,
    /// 0–100; higher is more formal.
    pub formality_score: f64,
    /// 0–100 Flesch-style reading ease; higher is easier.
    pub readability_score: f64,
    /// Unique words over total words, 0–1.
    pub vocabulary_richness: f64,
    /// Contraction tokens per word.
    pub contraction_rate: f64,
    /// Share of sentences not flagged as passive, 0–1.
    pub active_voice_rate: f64,
    /// Question marks per sentence.
    pub question_rate: f64,
    /// Exclamation marks per sentence.
    pub exclamation_rate: f64,
    /// First/second-person pronouns per word.
    pub pronoun_rate: f64,
    /// Recurring bigrams/trigrams, most frequent first, for prompt injection.
    pub top_ngrams: Vec<String>,
    /// Set when the input had too few sentences for stable sentence stats.
    pub low_confidence: bool,
}

/// Sentence stats need at least this many retained sentences to be trusted.
const MIN_SENTENCES: usize = 3;
/// Fragments shorter than this are interjections, excluded from sentence stats.
const MIN_SENTENCE_WORDS: usize = 4;
/// Fallback sentence stats when the input is too short to measure.
const DEFAULT_SENTENCE_LENGTH: f64 = 12.0;
const DEFAULT_SENTENCE_STD_DEV: f64 = 4.0;
const MAX_NGRAMS: usize = 8;

const PERSONAL_PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "we", "us", "our", "ours", "you", "your", "yours",
];

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "its", "of", "on", "or", "so", "that", "the", "their", "this", "to", "was",
    "we", "were", "will", "with", "you", "your",
];

const PASSIVE_AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being",
];

/// Computes a [`StyleMetrics`] profile over a set of text samples.
///
/// Deterministic: ties in n-gram ranking break lexicographically so repeated
/// calls on identical input return identical output.
pub fn compute_metrics(samples: &[&str]) -> StyleMetrics {
    let combined = samples.join("\n");
    let words = tokenize(&combined);
    let word_count = words.len();

    let all_sentences = split_sentences(&combined);
    let sentence_count = all_sentences.len();
    let retained: Vec<usize> = all_sentences
        .iter()
        .map(|s| s.split_whitespace().count())
        .filter(|len| *len >= MIN_SENTENCE_WORDS)
        .collect();

    let low_confidence = retained.len() < MIN_SENTENCES;
    let (avg_sentence_length, sentence_length_std_dev) = if low_confidence {
        (DEFAULT_SENTENCE_LENGTH, DEFAULT_SENTENCE_STD_DEV)
    } else {
        mean_and_std_dev(&retained)
    };

    let avg_word_length = if word_count == 0 {
        0.0
    } else {
        words.iter().map(String::len).sum::<usize>() as f64 / word_count as f64
    };

    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
    let vocabulary_richness = if word_count == 0 {
        0.0
    } else {
        unique.len() as f64 / word_count as f64
    };

    let contraction_count = combined
        .split_whitespace()
        .filter(|token| is_contraction(token))
        .count();
    let contraction_rate = rate(contraction_count, word_count);

    let question_rate = rate(combined.matches('?').count(), sentence_count);
    let exclamation_rate = rate(combined.matches('!').count(), sentence_count);

    let pronoun_count = words
        .iter()
        .filter(|w| PERSONAL_PRONOUNS.contains(&w.as_str()))
        .count();
    let pronoun_rate = rate(pronoun_count, word_count);

    let active_voice_rate = if sentence_count == 0 {
        1.0
    } else {
        let passive = all_sentences.iter().filter(|s| is_passive(s)).count();
        1.0 - passive as f64 / sentence_count as f64
    };

    let formality_score = formality(
        avg_sentence_length,
        avg_word_length,
        pronoun_rate,
        exclamation_rate,
    );
    let readability_score = readability(&words, word_count, sentence_count);
    let top_ngrams = top_ngrams(&words);

    StyleMetrics {
        word_count,
        sentence_count,
        avg_sentence_length,
        sentence_length_std_dev,
        avg_word_length,
        formality_score,
        readability_score,
        vocabulary_richness,
        contraction_rate,
        active_voice_rate,
        question_rate,
        exclamation_rate,
        pronoun_rate,
        top_ngrams,
        low_confidence,
    }
}

/// Splits on sentence-terminal punctuation and newlines, discarding empty
/// fragments.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Lowercased word tokens with surrounding punctuation stripped.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

fn is_contraction(token: &str) -> bool {
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'');
    trimmed.contains('\'')
        && trimmed
            .split('\'')
            .all(|part| part.chars().all(char::is_alphanumeric) && !part.is_empty())
}

fn rate(count: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        count as f64 / denominator as f64
    }
}

fn mean_and_std_dev(lengths: &[usize]) -> (f64, f64) {
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
    (mean, variance.sqrt())
}

fn formality(
    avg_sentence_length: f64,
    avg_word_length: f64,
    pronoun_rate: f64,
    exclamation_rate: f64,
) -> f64 {
    let mut score = 50.0;
    if avg_sentence_length > 15.0 {
        score += ((avg_sentence_length - 15.0) * 2.0).min(20.0);
    }
    if avg_word_length > 5.0 {
        score += ((avg_word_length - 5.0) * 12.0).min(15.0);
    }
    score -= (pronoun_rate * 150.0).min(20.0);
    score -= (exclamation_rate * 40.0).min(15.0);
    score.clamp(0.0, 100.0)
}

fn readability(words: &[String], word_count: usize, sentence_count: usize) -> f64 {
    if word_count == 0 || sentence_count == 0 {
        return 50.0;
    }
    let syllables: usize = words.iter().map(|w| estimate_syllables(w)).sum();
    let words_per_sentence = word_count as f64 / sentence_count as f64;
    let syllables_per_word = syllables as f64 / word_count as f64;
    (206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word).clamp(0.0, 100.0)
}

/// Vowel-cluster syllable estimate; a trailing silent "e" is dropped.
fn estimate_syllables(word: &str) -> usize {
    let mut count = 0;
    let mut in_cluster = false;
    for c in word.chars() {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !in_cluster {
            count += 1;
        }
        in_cluster = is_vowel;
    }
    if word.len() > 2 && word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

fn is_passive(sentence: &str) -> bool {
    let tokens: Vec<String> = tokenize(sentence);
    tokens.windows(2).any(|pair| {
        PASSIVE_AUXILIARIES.contains(&pair[0].as_str())
            && pair[1].len() > 3
            && (pair[1].ends_with("ed") || pair[1].ends_with("en"))
    })
}

/// Bigrams and trigrams occurring more than once, excluding n-grams made
/// entirely of stop-words, most frequent first, capped.
fn top_ngrams(words: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for n in [2usize, 3] {
        if words.len() < n {
            continue;
        }
        for window in words.windows(n) {
            if window.iter().all(|w| STOP_WORDS.contains(&w.as_str())) {
                continue;
            }
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }

    let mut recurring: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    recurring
        .into_iter()
        .take(MAX_NGRAMS)
        .map(|(ngram, _)| ngram)
        .collect()
}
