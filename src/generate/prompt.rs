use super::page::{Angle, PageAnalysis, PageData};
use crate::config::MessageLength;
use crate::llm::types::ChatMessage;
use crate::profile::types::VoiceProfile;
use crate::style::voice_match::VoiceMatchResult;
use std::fmt::Write;

/// How many exemplar excerpts a refinement prompt quotes back at the model.
const MAX_REFINE_EXEMPLARS: usize = 2;

/// Builds the first-draft generation prompt for one angle.
pub fn generation_messages(
    page: &PageData,
    analysis: &PageAnalysis,
    angle: Angle,
    profile: Option<&VoiceProfile>,
    length: MessageLength,
) -> Vec<ChatMessage> {
    let (min_words, max_words) = length.word_range();

    let mut system = String::from(
        "You write short, personal outreach messages that sound like a specific human wrote \
         them, never like a template. Ground every message in concrete details from the \
         target page. Never invent facts about the recipient.\n\n",
    );
    let _ = writeln!(system, "{}", page.platform.prompt_rules());
    let _ = writeln!(system, "{}", angle.framing());
    let _ = writeln!(
        system,
        "Length: {min_words}-{max_words} words for the message body."
    );
    system.push_str(
        "\nRespond with ONLY a JSON object:\n\
         {\"message\": \"the outreach message\", \"wordCount\": <int>, \
         \"hook\": \"the specific detail the message hangs on\", \
         \"voiceScore\": <0-100 self-estimate of voice fit>}",
    );

    let mut user = String::new();
    let _ = writeln!(user, "TARGET PAGE ({})", page.url);
    if !page.title.is_empty() {
        let _ = writeln!(user, "Title: {}", page.title);
    }
    if let Some(author) = &page.author {
        let _ = writeln!(user, "Author: {author}");
    }
    let _ = writeln!(user, "Content:\n{}\n", page.content);

    if !analysis.summary.is_empty() {
        let _ = writeln!(user, "ANALYSIS\nSummary: {}", analysis.summary);
        if !analysis.topics.is_empty() {
            let _ = writeln!(user, "Topics: {}", analysis.topics.join(", "));
        }
        if !analysis.tone.is_empty() {
            let _ = writeln!(user, "Page tone: {}", analysis.tone);
        }
        if !analysis.opportunities.is_empty() {
            let _ = writeln!(user, "Openings: {}", analysis.opportunities.join("; "));
        }
        user.push('\n');
    }

    if !page.thread.is_empty() {
        user.push_str("EARLIER CONVERSATION (oldest first)\n");
        for message in &page.thread {
            let _ = writeln!(user, "{}: {}", message.author, message.text);
        }
        user.push('\n');
    }

    if let Some(profile) = profile {
        user.push_str(&voice_block(profile));
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Builds the corrective second prompt from the current draft and its
/// weak voice-match dimensions.
pub fn refine_messages(
    current_message: &str,
    match_result: &VoiceMatchResult,
    profile: &VoiceProfile,
) -> Vec<ChatMessage> {
    let system = "You rewrite outreach messages to better match a specific author's voice \
                  while preserving the core content and intent. Change only what the listed \
                  weaknesses require.\n\nRespond with ONLY a JSON object:\n\
                  {\"message\": \"the rewritten message\", \"wordCount\": <int>, \
                  \"hook\": \"unchanged hook\", \"voiceScore\": <0-100 self-estimate>}"
        .to_string();

    let mut user = String::new();
    let _ = writeln!(user, "CURRENT DRAFT\n{current_message}\n");

    let weak = match_result.breakdown.weak_dimensions();
    if weak.is_empty() {
        let _ = writeln!(
            user,
            "WEAK DIMENSIONS\n(none below threshold; tighten overall voice fit)"
        );
    } else {
        user.push_str("WEAK DIMENSIONS (0-100, fix the lowest first)\n");
        for (name, score) in weak {
            let _ = writeln!(user, "- {name}: {score:.0}");
        }
    }
    user.push('\n');
    user.push_str(&voice_block(profile));

    for (i, exemplar) in profile.exemplars.iter().take(MAX_REFINE_EXEMPLARS).enumerate() {
        let _ = writeln!(user, "EXEMPLAR {} (author's own writing)\n{}\n", i + 1, exemplar.text);
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Renders the persisted voice profile as a prompt section.
fn voice_block(profile: &VoiceProfile) -> String {
    let mut block = String::from("AUTHOR VOICE PROFILE\n");
    let register = &profile.register;
    let _ = writeln!(
        block,
        "Register (1-10): warmth {}, directness {}, formality {}, playfulness {}, detail {}, energy {}",
        register.warmth,
        register.directness,
        register.formality,
        register.playfulness,
        register.detail,
        register.energy,
    );
    if !profile.tone.primary.is_empty() {
        let _ = writeln!(
            block,
            "Tone: {} / {} (humor: {}, confidence: {})",
            profile.tone.primary, profile.tone.secondary, profile.tone.humor, profile.tone.confidence,
        );
    }
    if !profile.descriptors.is_empty() {
        let _ = writeln!(block, "Voice in a word: {}", profile.descriptors.join(", "));
    }
    if !profile.rules.is_empty() {
        block.push_str("Always:\n");
        for rule in &profile.rules {
            let _ = writeln!(block, "- {rule}");
        }
    }
    if !profile.anti_patterns.is_empty() {
        block.push_str("Never:\n");
        for anti in &profile.anti_patterns {
            let _ = writeln!(block, "- {anti}");
        }
    }

    let signatures = &profile.signatures;
    if !signatures.opening_patterns.is_empty() {
        let _ = writeln!(block, "Typical openings: {}", signatures.opening_patterns.join(" | "));
    }
    if !signatures.closing_patterns.is_empty() {
        let _ = writeln!(block, "Typical closings: {}", signatures.closing_patterns.join(" | "));
    }
    if !signatures.transition_words.is_empty() {
        let _ = writeln!(block, "Transitions: {}", signatures.transition_words.join(", "));
    }
    if !signatures.catchphrases.is_empty() {
        let _ = writeln!(block, "Catchphrases: {}", signatures.catchphrases.join(", "));
    }

    let metrics = &profile.metrics;
    let _ = writeln!(
        block,
        "Target numbers: ~{:.0} words per sentence, formality {:.0}/100, \
         contractions {:.0}%, questions in {:.0}% of sentences",
        metrics.avg_sentence_length,
        metrics.formality_score,
        metrics.contraction_rate * 100.0,
        metrics.question_rate * 100.0,
    );
    if !metrics.top_ngrams.is_empty() {
        let _ = writeln!(block, "Recurring phrases: {}", metrics.top_ngrams.join(", "));
    }
    block.push('\n');
    block
}
