//! Integration tests for the controller channel: boots a real `axum`
//! server on an ephemeral port and drives it with real WebSocket/HTTP
//! clients, the way `node-sdk`'s `protocol_loop` test drives a real
//! gateway instead of mocking the socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use resonance_audio::{SttClient, SttError, SttTranscription, TtsClient, TtsError, WordTiming};
use resonance_config::Settings;
use resonance_core::{Agent, SlotAssignment, SlotId, VoiceProfile};
use resonance_engine::{BroadcastRequest, Engine};
use resonance_events::Orchestrator;
use resonance_llm::{
    CommentSelection, LlmClient, LlmError, PromptRequest, SentimentResponse, SpokenResponse, Turn2Response,
};
use resonance_server::{create_router, AppState, ConversationStore};
use resonance_worker::WorkerPool;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Always answers with a short, fixed reflection in `calm_soothing`.
struct FakeLlm;

#[async_trait]
impl LlmClient for FakeLlm {
    async fn generate_turn1(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "a quiet hum settles over the room".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_turn2(&self, _req: &PromptRequest) -> Result<Turn2Response, LlmError> {
        Ok(Turn2Response {
            selection: CommentSelection {
                target_slot_id: 2,
                comment: "that resonates with what I felt too".to_string(),
                voice_profile: VoiceProfile::WarmProfessional,
            },
        })
    }

    async fn generate_turn3(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "glad it landed the same way for you".to_string(), voice_profile: VoiceProfile::FriendlyCasual })
    }

    async fn generate_turn4(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "the room settles into a shared quiet".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_sentiment(&self, _req: &PromptRequest) -> Result<SentimentResponse, LlmError> {
        Ok(SentimentResponse { sentiment: "neutral".to_string(), justification: "steady, unremarkable tone".to_string() })
    }
}

/// Writes a short real WAV file instead of calling a vendor, so the
/// decomposition worker pool has real audio to operate on.
struct FakeTts;

#[async_trait]
impl TtsClient for FakeTts {
    async fn synthesize_to_file(
        &self,
        text: &str,
        _voice_profile: VoiceProfile,
        output_path: &std::path::Path,
    ) -> Result<(), TtsError> {
        let n = text.len().clamp(800, 4000);
        let samples: Vec<f32> = (0..n)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        resonance_audio::wav::write_mono_wav(output_path, &samples, 16_000)?;
        Ok(())
    }
}

struct FakeStt;

#[async_trait]
impl SttClient for FakeStt {
    async fn transcribe(
        &self,
        _audio_bytes: Vec<u8>,
        _file_name: &str,
        _language_code: Option<&str>,
    ) -> Result<SttTranscription, SttError> {
        Ok(SttTranscription {
            text: "hello there".to_string(),
            duration_ms: 500,
            words: vec![WordTiming { text: "hello".to_string(), start: 0.0, end: 0.5, kind: "word".to_string() }],
            language_code: Some("en".to_string()),
        })
    }
}

async fn start_test_server() -> (String, PathBuf) {
    let dir = std::env::temp_dir().join(format!("resonance-server-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();

    let mut settings = Settings::default();
    settings.waves_max_workers = 2;
    settings.waves_queue_max_size = 16;
    settings.waves_job_timeout_s = 10.0;
    settings.events_workflow_timeout_s = 5.0;
    settings.artifacts_dir = dir.to_string_lossy().into_owned();
    let settings = Arc::new(settings);

    let (orchestrator, results_tx) = Orchestrator::spawn(dir.clone(), Duration::from_secs_f64(settings.events_workflow_timeout_s));
    let worker_pool = Arc::new(WorkerPool::new(
        settings.waves_max_workers,
        settings.waves_queue_max_size,
        Duration::from_secs_f64(settings.waves_job_timeout_s),
        results_tx,
    ));
    let conversations = Arc::new(ConversationStore::new());
    let agents: Arc<[Agent]> = Agent::default_roster().into();

    let engine = Arc::new(Engine::new(
        Arc::new(FakeLlm),
        Arc::new(FakeTts),
        worker_pool,
        orchestrator.clone(),
        conversations.clone(),
        settings.clone(),
        agents.clone(),
        dir.clone(),
    ));

    let state = AppState {
        engine,
        orchestrator,
        conversations,
        stt: Arc::new(FakeStt),
        settings,
        agents,
        artifacts_dir: dir.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });

    (format!("127.0.0.1:{}", addr.port()), dir)
}

/// S5: connecting a second controller socket replaces the first, which
/// receives a close frame, while the new one keeps receiving events and
/// the `seq` counter never resets or goes backwards.
#[tokio::test]
async fn second_controller_connection_replaces_the_first() {
    let (addr, _dir) = start_test_server().await;
    let url = format!("ws://{addr}/v1/events");

    let (mut client_a, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let (mut client_b, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(msg)) = client_a.next().await {
            if matches!(msg, WsMessage::Close(_)) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(closed, "first controller connection should receive a close frame when replaced");

    // Trigger some orchestrator activity so client_b has something to observe.
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "message": "what do you notice right now",
        "slots": [
            { "slotId": 1, "agentId": "lumen" },
        ],
    });
    let _ = client.post(format!("http://{addr}/v1/chat")).json(&body).send().await;

    let got_event = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(Ok(msg)) = client_b.next().await {
            if let WsMessage::Text(text) = msg {
                return Some(text);
            }
        }
        None
    })
    .await
    .ok()
    .flatten();

    assert!(got_event.is_some(), "second controller connection should keep receiving events");
}

/// S6: a broadcast client that disconnects mid Turn 1 does not stop the
/// engine; it keeps running to FINALIZE and the session manifest is
/// written as if nothing happened.
#[tokio::test]
async fn broadcast_client_disconnect_does_not_abort_the_engine() {
    let (addr, dir) = start_test_server().await;

    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "message": "tell me what you notice",
        "slots": [
            { "slotId": 1, "agentId": "lumen" },
            { "slotId": 2, "agentId": "tidal" },
        ],
    });

    // Drop the SSE response body immediately after the connection opens,
    // simulating a client that disconnects mid Turn 1.
    {
        let response = client.post(format!("http://{addr}/v1/chat")).json(&body).send().await.unwrap();
        assert!(response.status().is_success());
        drop(response);
    }

    // The engine keeps running on its own task; poll for the manifest that
    // only gets written once `execute()` reaches its end.
    let manifest_written = tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            let mut entries = tokio::fs::read_dir(dir.join("tts").join("sessions")).await;
            if let Ok(dir_entries) = &mut entries {
                if let Ok(Some(session_entry)) = dir_entries.next_entry().await {
                    let manifest_path = session_entry.path().join("session.json");
                    if tokio::fs::metadata(&manifest_path).await.is_ok() {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    })
    .await
    .unwrap_or(false);

    assert!(manifest_written, "engine should finish and write a manifest even after the SSE client disconnects");
}
