use super::http::build_http_client;
use super::sse::{SseBuffer, is_done_sentinel, parse_data_lines};
use super::types::{ChatCompletionChunk, ChatMessage, ChatRequest};
use crate::config::CompletionConfig;
use crate::error::LlmError;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type CompletionStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Events produced by a streaming chat call.
///
/// `ResponseStart` is emitted once per model attempt. When a model fails
/// mid-stream and the client falls back to the next candidate, a fresh
/// `ResponseStart` arrives and the consumer must discard any text it
/// accumulated from the failed attempt; that is how partial output from a
/// failed model stays out of final state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ResponseStart { model: String },
    TextDelta { text: String },
    Done { full_text: String },
}

/// Streaming chat backend seam. The orchestrator depends on this trait so
/// the state machine is testable without a network.
pub trait CompletionBackend: Send + Sync {
    fn stream_chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model_override: Option<&'a str>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionStream, LlmError>> + Send + 'a>>;
}

/// Drains a completion stream and returns the final accumulated text.
/// Convenience for call sites that want the full response, not live deltas.
pub async fn collect_completion(mut stream: CompletionStream) -> Result<String, LlmError> {
    let mut latest = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::ResponseStart { .. } => latest.clear(),
            StreamEvent::TextDelta { text } => latest.push_str(&text),
            StreamEvent::Done { full_text } => return Ok(full_text),
        }
    }
    Err(LlmError::Streaming(
        "stream ended without a completion event".into(),
    ))
}

const APP_HEADERS: [(&str, &str); 2] = [
    ("HTTP-Referer", "https://github.com/warmreach/warmreach"),
    ("X-Title", "WarmReach"),
];

/// Streaming chat-completions client with ordered model fallback.
///
/// Stateless between invocations: every call builds its candidate list,
/// walks it until one model streams to completion, and surfaces a single
/// aggregated error only if every candidate failed.
pub struct CompletionClient {
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    endpoint: String,
    models: Vec<String>,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            cached_auth_header: config.api_key.as_deref().map(|k| format!("Bearer {k}")),
            endpoint: config.endpoint.clone(),
            models: config.models.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: build_http_client(),
        }
    }

    /// Candidate order: the per-call override first, then the configured
    /// priority list, deduplicated.
    fn candidate_models(&self, model_override: Option<&str>) -> Vec<String> {
        let mut candidates = Vec::with_capacity(self.models.len() + 1);
        if let Some(preferred) = model_override {
            candidates.push(preferred.to_string());
        }
        for model in &self.models {
            if !candidates.iter().any(|m| m == model) {
                candidates.push(model.clone());
            }
        }
        candidates
    }

    fn open_stream(
        &self,
        messages: Vec<ChatMessage>,
        model_override: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, LlmError> {
        let auth_header = self
            .cached_auth_header
            .clone()
            .ok_or(LlmError::MissingApiKey)?;
        let candidates = self.candidate_models(model_override);
        let endpoint = self.endpoint.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;
        let http = self.client.clone();

        let stream = async_stream::try_stream! {
            let attempts = candidates.len();
            let mut last_failure: Option<String> = None;
            let mut completed = false;

            for model in candidates {
                if cancel.is_cancelled() {
                    fail(LlmError::Cancelled)?;
                }

                let request = ChatRequest {
                    model: &model,
                    messages: &messages,
                    stream: true,
                    temperature,
                    max_tokens,
                };
                let mut builder = http
                    .post(&endpoint)
                    .header("Authorization", &auth_header)
                    .json(&request);
                for (name, value) in APP_HEADERS {
                    builder = builder.header(name, value);
                }

                let sent = tokio::select! {
                    () = cancel.cancelled() => None,
                    result = builder.send() => Some(result),
                };
                let Some(sent) = sent else {
                    fail(LlmError::Cancelled)?;
                    break;
                };

                let response = match sent {
                    Err(error) => {
                        last_failure = Some(format!("{model}: {error}"));
                        continue;
                    }
                    Ok(response) if !response.status().is_success() => {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        let snippet: String = body.chars().take(200).collect();
                        tracing::warn!(
                            model = model.as_str(),
                            status = status.as_u16(),
                            "Model rejected request, trying next candidate"
                        );
                        last_failure = Some(format!("{model}: HTTP {status}: {snippet}"));
                        continue;
                    }
                    Ok(response) => response,
                };

                yield StreamEvent::ResponseStart {
                    model: model.clone(),
                };

                let mut accumulated = String::new();
                let mut sse = SseBuffer::new();
                let mut bytes = response.bytes_stream();
                let mut model_failure: Option<String> = None;
                let mut finished = false;

                while !finished && model_failure.is_none() {
                    let next = tokio::select! {
                        () = cancel.cancelled() => None,
                        chunk = bytes.next() => Some(chunk),
                    };
                    let Some(chunk) = next else {
                        fail(LlmError::Cancelled)?;
                        break;
                    };

                    match chunk {
                        None => {
                            // Some backends close right after the final event
                            // without a trailing blank line; drain the buffer
                            // before declaring the stream truncated.
                            let tail = sse.take_remaining();
                            let mut saw_done = false;
                            if let Some(tail) = &tail {
                                for data in parse_data_lines(tail) {
                                    if is_done_sentinel(data) {
                                        saw_done = true;
                                        continue;
                                    }
                                    let Ok(parsed) =
                                        serde_json::from_str::<ChatCompletionChunk>(data)
                                    else {
                                        continue;
                                    };
                                    for choice in &parsed.choices {
                                        if let Some(content) = &choice.delta.content {
                                            if !content.is_empty() {
                                                accumulated.push_str(content);
                                                yield StreamEvent::TextDelta {
                                                    text: content.clone(),
                                                };
                                            }
                                        }
                                    }
                                }
                            }
                            if saw_done {
                                yield StreamEvent::Done {
                                    full_text: accumulated.clone(),
                                };
                                finished = true;
                            } else {
                                model_failure =
                                    Some(format!("{model}: stream ended before completion"));
                            }
                        }
                        Some(Err(error)) => {
                            model_failure = Some(format!("{model}: {error}"));
                        }
                        Some(Ok(chunk)) => {
                            sse.push_chunk(&chunk);
                            while let Some(block) = sse.next_event_block() {
                                for data in parse_data_lines(&block) {
                                    if is_done_sentinel(data) {
                                        yield StreamEvent::Done {
                                            full_text: accumulated.clone(),
                                        };
                                        finished = true;
                                        break;
                                    }
                                    let Ok(parsed) =
                                        serde_json::from_str::<ChatCompletionChunk>(data)
                                    else {
                                        continue;
                                    };
                                    for choice in &parsed.choices {
                                        if let Some(content) = &choice.delta.content {
                                            if !content.is_empty() {
                                                accumulated.push_str(content);
                                                yield StreamEvent::TextDelta {
                                                    text: content.clone(),
                                                };
                                            }
                                        }
                                    }
                                }
                                if finished {
                                    break;
                                }
                            }
                        }
                    }
                }

                if finished {
                    completed = true;
                    break;
                }
                if let Some(failure) = model_failure {
                    tracing::warn!(
                        model = model.as_str(),
                        "Model stream failed, trying next candidate: {failure}"
                    );
                    last_failure = Some(failure);
                }
            }

            if !completed {
                fail(LlmError::AllModelsFailed {
                    attempts,
                    last: last_failure.unwrap_or_else(|| "no candidate models configured".into()),
                })?;
            }
        };

        Ok(Box::pin(stream))
    }
}

fn fail(error: LlmError) -> Result<(), LlmError> {
    Err(error)
}

impl CompletionBackend for CompletionClient {
    fn stream_chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        model_override: Option<&'a str>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionStream, LlmError>> + Send + 'a>> {
        Box::pin(async move { self.open_stream(messages.to_vec(), model_override, cancel) })
    }
}
