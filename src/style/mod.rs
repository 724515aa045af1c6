pub mod authenticity;
pub mod metrics;
pub mod voice_match;

pub use authenticity::{AiScoreResult, score_authenticity};
pub use metrics::{StyleMetrics, compute_metrics};
pub use voice_match::{MatchBreakdown, VoiceMatchResult, score_voice_match};
