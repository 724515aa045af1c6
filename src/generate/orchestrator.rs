use super::page::{Angle, PageAnalysis, PageData};
use super::prompt;
use super::session::{GeneratedMessage, GenerationSession, SessionSnapshot, SessionState};
use crate::config::EngineConfig;
use crate::error::LlmError;
use crate::llm::client::{CompletionBackend, StreamEvent};
use crate::llm::partial::{extract_string_field, salvage_string_field, strip_code_fences};
use crate::llm::types::ChatMessage;
use crate::store::{AnalysisCache, ProfileStore};
use crate::style::{score_authenticity, score_voice_match};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Voice score recorded when the model's JSON was salvaged and no
/// self-estimate survived.
const NEUTRAL_VOICE_SCORE: f64 = 50.0;

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "502",
    "503",
];

/// Owns per-angle generation state: debounce, streaming, retries,
/// cancellation, scoring, and the refinement loop.
///
/// At most one generation or refinement network call is in flight per
/// orchestrator at a time, regardless of angle; starting a new run cancels
/// the previous one first. Session maps are only mutated under one lock
/// with no await inside, so every observable update is atomic.
pub struct GenerationOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    config: Arc<EngineConfig>,
    profiles: Arc<ProfileStore>,
    cache: Arc<AnalysisCache>,
    inner: Mutex<Inner>,
    run_counter: AtomicU64,
}

struct Inner {
    sessions: HashMap<Angle, GenerationSession>,
    current_run: Option<RunHandle>,
}

struct RunHandle {
    run_id: u64,
    angle: Angle,
    token: CancellationToken,
}

enum RunKind {
    Generate {
        page: PageData,
        analysis: Option<PageAnalysis>,
    },
    Refine {
        messages: Vec<ChatMessage>,
    },
}

impl GenerationOrchestrator {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        config: Arc<EngineConfig>,
        profiles: Arc<ProfileStore>,
        cache: Arc<AnalysisCache>,
    ) -> Self {
        Self {
            backend,
            config,
            profiles,
            cache,
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                current_run: None,
            }),
            run_counter: AtomicU64::new(0),
        }
    }

    /// Read-only view of one angle's session for the host UI.
    pub fn snapshot(&self, angle: Angle) -> SessionSnapshot {
        let mut inner = self.lock_inner();
        inner
            .sessions
            .entry(angle)
            .or_insert_with(|| GenerationSession::new(angle))
            .snapshot()
    }

    /// Starts a generation for `angle`. Returns `false` when the request was
    /// dropped: the angle is already generating/refining (duplicate request)
    /// or already holds a completed message (leave via regenerate/refine).
    pub fn generate_message(
        self: &Arc<Self>,
        page: PageData,
        analysis: Option<PageAnalysis>,
        angle: Angle,
    ) -> bool {
        let (run_id, token) = {
            let mut inner = self.lock_inner();
            let session = inner
                .sessions
                .entry(angle)
                .or_insert_with(|| GenerationSession::new(angle));
            if session.state.is_busy() || session.state == SessionState::Complete {
                tracing::debug!(angle = %angle, state = ?session.state, "generation request dropped");
                return false;
            }
            self.begin_run_locked(&mut inner, angle, SessionState::Debouncing)
        };

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .drive(RunKind::Generate { page, analysis }, angle, run_id, token)
                .await;
        });
        true
    }

    /// Clears the angle's message and score caches, then generates afresh.
    pub fn regenerate_message(
        self: &Arc<Self>,
        page: PageData,
        analysis: Option<PageAnalysis>,
        angle: Angle,
    ) -> bool {
        {
            let mut inner = self.lock_inner();
            if inner
                .current_run
                .as_ref()
                .is_some_and(|run| run.angle == angle)
            {
                Self::cancel_current_locked(&mut inner);
            }
            let session = inner
                .sessions
                .entry(angle)
                .or_insert_with(|| GenerationSession::new(angle));
            let run_id = session.run_id;
            *session = GenerationSession::new(angle);
            // Keep the id monotonic so writes from the cancelled run stay stale.
            session.run_id = run_id + 1;
        }
        self.generate_message(page, analysis, angle)
    }

    /// Runs one corrective pass over the angle's completed message. Only
    /// meaningful once a voice-match result exists; returns `false` otherwise.
    pub fn refine_message(self: &Arc<Self>, angle: Angle) -> bool {
        let Some(profile) = self.profiles.current() else {
            return false;
        };

        let (messages, run_id, token) = {
            let mut inner = self.lock_inner();
            let Some(session) = inner.sessions.get(&angle) else {
                return false;
            };
            if session.state != SessionState::Complete {
                return false;
            }
            let (Some(result), Some(voice_match)) = (&session.result, &session.voice_match) else {
                return false;
            };

            let messages = prompt::refine_messages(&result.message, voice_match, &profile);
            let (run_id, token) = self.begin_run_locked(&mut inner, angle, SessionState::Refining);
            (messages, run_id, token)
        };

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator
                .drive(RunKind::Refine { messages }, angle, run_id, token)
                .await;
        });
        true
    }

    /// Cancels any in-flight run, e.g. on screen exit.
    pub fn cancel_all(&self) {
        let mut inner = self.lock_inner();
        Self::cancel_current_locked(&mut inner);
    }

    // ── Run lifecycle ───────────────────────────────────────────────────

    /// Cancels the previous run (single-flight) and installs a new one for
    /// `angle`, leaving its session in `initial_state`.
    fn begin_run_locked(
        &self,
        inner: &mut Inner,
        angle: Angle,
        initial_state: SessionState,
    ) -> (u64, CancellationToken) {
        Self::cancel_current_locked(inner);

        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        inner.current_run = Some(RunHandle {
            run_id,
            angle,
            token: token.clone(),
        });

        let session = inner
            .sessions
            .entry(angle)
            .or_insert_with(|| GenerationSession::new(angle));
        session.state = initial_state;
        session.streamed_text.clear();
        session.preview = None;
        session.error = None;
        session.run_id = run_id;

        (run_id, token)
    }

    /// Cancels the in-flight run and rolls its session back to a stable
    /// state: a refining session keeps its completed message, anything else
    /// returns to idle. The cancelled task itself never touches state again.
    fn cancel_current_locked(inner: &mut Inner) {
        let Some(handle) = inner.current_run.take() else {
            return;
        };
        handle.token.cancel();

        if let Some(session) = inner.sessions.get_mut(&handle.angle) {
            if session.run_id == handle.run_id && session.state.is_busy() {
                session.state = if session.state == SessionState::Refining {
                    SessionState::Complete
                } else {
                    SessionState::Idle
                };
                session.streamed_text.clear();
                session.preview = None;
                // Invalidate any late writes from the cancelled task.
                session.run_id += 1;
            }
        }
    }

    fn finish_run(&self, run_id: u64) {
        let mut inner = self.lock_inner();
        if inner
            .current_run
            .as_ref()
            .is_some_and(|run| run.run_id == run_id)
        {
            inner.current_run = None;
        }
    }

    async fn drive(
        self: Arc<Self>,
        kind: RunKind,
        angle: Angle,
        run_id: u64,
        token: CancellationToken,
    ) {
        let (messages, refining) = match kind {
            RunKind::Generate { page, analysis } => {
                let debounce = self.config.timing.debounce();
                if !debounce.is_zero() {
                    tokio::select! {
                        () = token.cancelled() => return,
                        () = tokio::time::sleep(debounce) => {}
                    }
                }

                let analysis = self.resolve_analysis(&page, analysis).await;
                let profile = self.profiles.current();
                let messages = prompt::generation_messages(
                    &page,
                    &analysis,
                    angle,
                    profile.as_deref(),
                    self.config.message_length,
                );
                (messages, false)
            }
            RunKind::Refine { messages } => (messages, true),
        };

        if !refining {
            self.with_session(angle, run_id, |session| {
                session.state = SessionState::Generating;
            });
        }

        let max_retries = self.config.timing.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.run_stream(&messages, angle, run_id, &token).await {
                Ok(()) => return,
                Err(LlmError::Cancelled) => return,
                Err(error) => {
                    let description = error.to_string();
                    if is_transient(&description) && attempt < max_retries {
                        attempt += 1;
                        self.with_session(angle, run_id, |session| {
                            session.retry_count = attempt;
                        });
                        let backoff = self.config.timing.backoff_for_attempt(attempt);
                        tracing::warn!(
                            angle = %angle,
                            attempt,
                            max_retries,
                            "transient generation failure, retrying: {description}"
                        );
                        tokio::select! {
                            () = token.cancelled() => return,
                            () = tokio::time::sleep(backoff) => {}
                        }
                        continue;
                    }

                    tracing::warn!(angle = %angle, "generation failed: {description}");
                    self.with_session(angle, run_id, |session| {
                        session.state = SessionState::Error;
                        session.error = Some(description.clone());
                        session.retry_count = 0;
                    });
                    self.finish_run(run_id);
                    return;
                }
            }
        }
    }

    /// One streaming attempt: forwards deltas into the session, watches for
    /// premature full-JSON completion, parses (or salvages) the final text.
    async fn run_stream(
        &self,
        messages: &[ChatMessage],
        angle: Angle,
        run_id: u64,
        token: &CancellationToken,
    ) -> Result<(), LlmError> {
        let mut stream = self
            .backend
            .stream_chat(messages, None, token.clone())
            .await?;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::ResponseStart { model } => {
                    // A fresh start after a model fallback: drop partial text
                    // from the failed attempt.
                    self.with_session(angle, run_id, |session| {
                        session.streamed_text.clear();
                        session.preview = None;
                    });
                    tracing::debug!(model, angle = %angle, "completion stream started");
                }
                StreamEvent::TextDelta { text } => {
                    let mut accumulated = String::new();
                    self.with_session(angle, run_id, |session| {
                        session.streamed_text.push_str(&text);
                        if let Some(message) =
                            extract_string_field("message", &session.streamed_text)
                        {
                            session.preview = Some(message);
                        }
                        accumulated = session.streamed_text.clone();
                    });

                    // Some models emit the entire JSON document in one chunk;
                    // a successful full parse with both required fields
                    // completes the session without waiting for the
                    // terminator.
                    if let Some(result) = parse_premature(&accumulated) {
                        self.complete(angle, run_id, result);
                        return Ok(());
                    }
                }
                StreamEvent::Done { full_text } => {
                    let result = parse_final(&full_text)?;
                    self.complete(angle, run_id, result);
                    return Ok(());
                }
            }
        }

        Err(LlmError::Streaming(
            "stream ended without a completion event".into(),
        ))
    }

    /// Records a finished message and re-runs both scorers against it.
    fn complete(&self, angle: Angle, run_id: u64, result: GeneratedMessage) {
        let voice_match = self.profiles.current().map(|profile| {
            score_voice_match(
                &result.message,
                &profile.metrics,
                &self.config.scoring.voice_match,
                &self.config.scoring.tolerances,
            )
        });
        let ai_score = score_authenticity(&result.message, &self.config.scoring.authenticity);

        self.with_session(angle, run_id, |session| {
            session.state = SessionState::Complete;
            session.result = Some(result);
            session.voice_match = voice_match;
            session.ai_score = Some(ai_score);
            session.error = None;
            session.retry_count = 0;
            session.preview = None;
        });
        self.finish_run(run_id);
    }

    /// Consults the 24-hour analysis cache before any completion call; a
    /// freshly supplied analysis refreshes the cache.
    async fn resolve_analysis(
        &self,
        page: &PageData,
        analysis: Option<PageAnalysis>,
    ) -> PageAnalysis {
        match analysis {
            Some(analysis) => {
                if let Err(error) = self.cache.put(&page.url, &analysis).await {
                    tracing::debug!("analysis cache write failed: {error}");
                }
                analysis
            }
            None => match self.cache.get(&page.url).await {
                Ok(Some(cached)) => cached,
                Ok(None) => PageAnalysis::default(),
                Err(error) => {
                    tracing::debug!("analysis cache read failed: {error}");
                    PageAnalysis::default()
                }
            },
        }
    }

    /// Applies `update` to the angle's session only while `run_id` is still
    /// the session's owner; writes from cancelled runs are dropped here.
    fn with_session(&self, angle: Angle, run_id: u64, update: impl FnOnce(&mut GenerationSession)) {
        let mut inner = self.lock_inner();
        if let Some(session) = inner.sessions.get_mut(&angle) {
            if session.run_id == run_id {
                update(session);
            }
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn is_transient(description: &str) -> bool {
    let lowered = description.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGenerated {
    message: String,
    #[serde(default)]
    word_count: Option<u64>,
    #[serde(default)]
    hook: Option<String>,
    #[serde(default)]
    voice_score: Option<f64>,
}

impl RawGenerated {
    fn into_message(self) -> GeneratedMessage {
        let word_count = self
            .word_count
            .map_or_else(|| self.message.split_whitespace().count(), |count| count as usize);
        GeneratedMessage {
            word_count,
            hook: self.hook.unwrap_or_default(),
            voice_score: self
                .voice_score
                .unwrap_or(NEUTRAL_VOICE_SCORE)
                .clamp(0.0, 100.0),
            message: self.message,
        }
    }
}

/// Mid-stream completion check: only a full parse carrying both `message`
/// and `wordCount` counts, otherwise we keep streaming.
fn parse_premature(accumulated: &str) -> Option<GeneratedMessage> {
    let raw: RawGenerated = serde_json::from_str(strip_code_fences(accumulated)).ok()?;
    if raw.word_count.is_none() || raw.message.is_empty() {
        return None;
    }
    Some(raw.into_message())
}

/// Final-text parse with the salvage fallback: when the JSON is malformed
/// or truncated, recover at least the message field and synthesize the rest.
fn parse_final(full_text: &str) -> Result<GeneratedMessage, LlmError> {
    let cleaned = strip_code_fences(full_text);
    if let Ok(raw) = serde_json::from_str::<RawGenerated>(cleaned) {
        return Ok(raw.into_message());
    }

    if let Some(message) = salvage_string_field("message", full_text) {
        tracing::warn!("completion JSON malformed, salvaged message field");
        let word_count = message.split_whitespace().count();
        return Ok(GeneratedMessage {
            message,
            word_count,
            hook: String::new(),
            voice_score: NEUTRAL_VOICE_SCORE,
        });
    }

    Err(LlmError::Streaming(
        "response contained no usable message field".into(),
    ))
}
