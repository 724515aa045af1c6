//! End-to-end generation flow over a live mock endpoint: real streaming
//! client, real orchestrator, scripted SSE responses.

use std::sync::Arc;
use std::time::Duration;

use warmreach::config::{EngineConfig, TimingConfig};
use warmreach::generate::{Angle, GenerationOrchestrator, PageAnalysis, PageData, SessionState};
use warmreach::llm::CompletionClient;
use warmreach::profile::VoiceProfile;
use warmreach::store::{AnalysisCache, MemoryStore, ProfileStore};
use warmreach::style::compute_metrics;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn sse_body(json_payload: &str) -> String {
    let mut body = String::new();
    // Split the payload into a few deltas so the partial-extraction path
    // actually runs.
    let chunk_size = (json_payload.len() / 3).max(1);
    let mut rest = json_payload;
    while !rest.is_empty() {
        let mut split = chunk_size.min(rest.len());
        while !rest.is_char_boundary(split) {
            split += 1;
        }
        let (head, tail) = rest.split_at(split);
        let escaped = head.replace('\\', "\\\\").replace('"', "\\\"");
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{escaped}\"}}}}]}}\n\n"
        ));
        rest = tail;
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn engine_config(server_uri: &str) -> Arc<EngineConfig> {
    let mut config = EngineConfig::default();
    config.completion.api_key = Some("test-key".into());
    config.completion.endpoint = format!("{server_uri}/v1/chat/completions");
    config.completion.models = vec!["primary-model".into()];
    config.timing = TimingConfig {
        debounce_ms: 0,
        max_retries: 1,
        backoff_base_ms: 1,
    };
    Arc::new(config)
}

async fn wait_for_state(
    orchestrator: &Arc<GenerationOrchestrator>,
    angle: Angle,
    state: SessionState,
) {
    for _ in 0..500 {
        if orchestrator.snapshot(angle).state == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "angle never reached {state:?}, currently {:?}",
        orchestrator.snapshot(angle).state
    );
}

#[tokio::test]
async fn generates_scores_and_refines_over_the_wire() {
    init_tracing();
    let server = MockServer::start().await;
    let payload = r#"{"message": "Saw your writeup on partition batching. We shipped the same fix in March and cut costs hard. Want to trade notes on the edge cases?", "wordCount": 26, "hook": "partition batching writeup", "voiceScore": 78}"#;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(payload), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let config = engine_config(&server.uri());
    let kv = Arc::new(MemoryStore::new());
    let profiles = Arc::new(ProfileStore::new(Arc::clone(&kv) as _));
    profiles
        .save(VoiceProfile::from_metrics(
            2,
            compute_metrics(&[
                "I keep notes short and concrete. I reference the exact thing I read. \
                 I ask one question and stop.",
            ]),
        ))
        .await
        .unwrap();

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        Arc::new(CompletionClient::new(&config.completion)),
        Arc::clone(&config),
        Arc::clone(&profiles),
        Arc::new(AnalysisCache::new(kv as _)),
    ));

    let page = PageData {
        url: "https://example.com/in/dana".into(),
        title: "Dana Ellis".into(),
        content: "Post about cutting stream costs via partition batching.".into(),
        ..PageData::default()
    };
    let analysis = PageAnalysis {
        summary: "Platform lead, cares about stream costs".into(),
        ..PageAnalysis::default()
    };

    assert!(orchestrator.generate_message(page, Some(analysis), Angle::Value));
    wait_for_state(&orchestrator, Angle::Value, SessionState::Complete).await;

    let snapshot = orchestrator.snapshot(Angle::Value);
    let result = snapshot.result.expect("completed message");
    assert!(result.message.contains("partition batching"));
    assert_eq!(result.word_count, 26);

    // Both scorers ran against the final text.
    let voice = snapshot.voice_match.expect("voice match with profile present");
    assert!(voice.score > 0.0 && voice.score <= 100.0);
    let ai = snapshot.ai_score.expect("authenticity score");
    assert!(ai.score < 60.0, "specific concrete text scored {}", ai.score);

    // The refinement pass supersedes the message through the same path.
    assert!(orchestrator.refine_message(Angle::Value));
    wait_for_state(&orchestrator, Angle::Value, SessionState::Complete).await;
    assert!(orchestrator.snapshot(Angle::Value).result.is_some());

    // Exactly one generation + one refinement hit the endpoint.
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn model_fallback_is_invisible_to_the_session() {
    init_tracing();
    let server = MockServer::start().await;
    let payload = r#"{"message": "Short note about your benchmark thread, the tail latency chart matched ours.", "wordCount": 12, "hook": "benchmark thread", "voiceScore": 70}"#;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(wiremock::matchers::body_partial_json(
            serde_json::json!({"model": "flaky-model"}),
        ))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(wiremock::matchers::body_partial_json(
            serde_json::json!({"model": "steady-model"}),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(payload), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let mut config = EngineConfig::default();
    config.completion.api_key = Some("test-key".into());
    config.completion.endpoint = format!("{}/v1/chat/completions", server.uri());
    config.completion.models = vec!["flaky-model".into(), "steady-model".into()];
    config.timing = TimingConfig {
        debounce_ms: 0,
        max_retries: 0,
        backoff_base_ms: 1,
    };
    let config = Arc::new(config);

    let kv = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        Arc::new(CompletionClient::new(&config.completion)),
        Arc::clone(&config),
        Arc::new(ProfileStore::new(Arc::clone(&kv) as _)),
        Arc::new(AnalysisCache::new(kv as _)),
    ));

    let page = PageData {
        url: "https://example.com/thread/42".into(),
        title: "Benchmark thread".into(),
        content: "Tail latency benchmark discussion.".into(),
        ..PageData::default()
    };

    orchestrator.generate_message(page, None, Angle::Community);
    wait_for_state(&orchestrator, Angle::Community, SessionState::Complete).await;

    let snapshot = orchestrator.snapshot(Angle::Community);
    assert!(snapshot.error.is_none());
    assert!(
        snapshot
            .result
            .unwrap()
            .message
            .contains("benchmark thread")
    );
}
