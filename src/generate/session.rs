use super::page::Angle;
use crate::style::{AiScoreResult, VoiceMatchResult};
use serde::{Deserialize, Serialize};

/// Lifecycle of one angle's generation, as an explicit tagged state so
/// invalid combinations (generating and complete at once) cannot exist.
///
/// `Idle → Debouncing → Generating → Complete`, with `Error` reachable from
/// `Generating` and `Refining` reachable from `Complete`. `Complete` is only
/// left through an explicit regenerate or refine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Debouncing,
    Generating,
    Refining,
    Complete,
    Error,
}

impl SessionState {
    /// States with an in-flight or pending network call.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionState::Debouncing | SessionState::Generating | SessionState::Refining
        )
    }
}

/// Immutable result of a completed generation; superseded wholesale by a
/// refinement for the same angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMessage {
    pub message: String,
    pub word_count: usize,
    pub hook: String,
    /// Model's own 0–100 estimate of voice fit (distinct from the locally
    /// measured voice-match score).
    pub voice_score: f64,
}

/// Per-angle transient state machine instance.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub angle: Angle,
    pub state: SessionState,
    /// Raw accumulated response text for the in-flight call.
    pub streamed_text: String,
    /// Live message extraction from the partial stream, for display.
    pub preview: Option<String>,
    pub result: Option<GeneratedMessage>,
    pub voice_match: Option<VoiceMatchResult>,
    pub ai_score: Option<AiScoreResult>,
    pub error: Option<String>,
    pub retry_count: u32,
    /// Monotonic id of the run allowed to mutate this session; writes from
    /// a cancelled run carry a stale id and are dropped.
    pub run_id: u64,
}

impl GenerationSession {
    pub fn new(angle: Angle) -> Self {
        Self {
            angle,
            state: SessionState::Idle,
            streamed_text: String::new(),
            preview: None,
            result: None,
            voice_match: None,
            ai_score: None,
            error: None,
            retry_count: 0,
            run_id: 0,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            angle: self.angle,
            state: self.state,
            preview: self.preview.clone(),
            result: self.result.clone(),
            voice_match: self.voice_match.clone(),
            ai_score: self.ai_score.clone(),
            error: self.error.clone(),
            retry_count: self.retry_count,
        }
    }
}

/// Read-only view of a session handed to the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub angle: Angle,
    pub state: SessionState,
    pub preview: Option<String>,
    pub result: Option<GeneratedMessage>,
    pub voice_match: Option<VoiceMatchResult>,
    pub ai_score: Option<AiScoreResult>,
    pub error: Option<String>,
    pub retry_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_states() {
        assert!(SessionState::Debouncing.is_busy());
        assert!(SessionState::Generating.is_busy());
        assert!(SessionState::Refining.is_busy());
        assert!(!SessionState::Idle.is_busy());
        assert!(!SessionState::Complete.is_busy());
        assert!(!SessionState::Error.is_busy());
    }

    #[test]
    fn new_session_is_idle_and_empty() {
        let session = GenerationSession::new(Angle::Value);
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.result.is_none());
        assert_eq!(session.retry_count, 0);
    }

    #[test]
    fn snapshot_reflects_session() {
        let mut session = GenerationSession::new(Angle::Service);
        session.state = SessionState::Complete;
        session.result = Some(GeneratedMessage {
            message: "hi".into(),
            word_count: 1,
            hook: "h".into(),
            voice_score: 72.0,
        });
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Complete);
        assert_eq!(snapshot.result.unwrap().word_count, 1);
    }
}
