//! End-to-end tests of the four-turn state machine with fake LLM/TTS
//! collaborators and a real worker pool + orchestrator, driven directly
//! through `Engine::run_broadcast` (no HTTP surface involved).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resonance_audio::{TtsClient, TtsError};
use resonance_config::Settings;
use resonance_core::{
    Agent, Conversation, ConversationAccess, ConversationEntry, SlotAssignment, SlotId, VoiceProfile,
};
use resonance_engine::{BroadcastRequest, Engine, EngineEvent};
use resonance_events::Orchestrator;
use resonance_llm::{
    CommentSelection, LlmClient, LlmError, PromptRequest, SentimentResponse, SpokenResponse, Turn2Response,
};
use resonance_worker::WorkerPool;
use tokio::sync::mpsc::UnboundedReceiver;

/// Minimal in-memory [`ConversationAccess`] for tests; the real
/// `DashMap`-backed store lives in `resonance-server` (C2 is a
/// request-surface concern per `SPEC_FULL.md` §2), which this crate must
/// not depend on.
#[derive(Default)]
struct FakeConversationStore {
    slots: Mutex<HashMap<SlotId, Conversation>>,
}

impl ConversationAccess for FakeConversationStore {
    fn get_or_create(&self, slot_id: SlotId, system_preamble: &str) -> Conversation {
        self.slots
            .lock()
            .unwrap()
            .entry(slot_id)
            .or_insert_with(|| Conversation::new(system_preamble))
            .clone()
    }

    fn append(&self, slot_id: SlotId, entry: ConversationEntry) {
        self.slots.lock().unwrap().entry(slot_id).or_insert_with(|| Conversation::new("")).push(entry);
    }
}

/// Every Turn-2 comment targets this fixed slot, so Turn-3 skew tests
/// (S3) can force more than `MAX_COMMENTS_PER_TARGET` comments at one slot.
struct FixedTargetLlm {
    target_slot_id: u8,
}

#[async_trait]
impl LlmClient for FixedTargetLlm {
    async fn generate_turn1(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "the room hums with a low reflection".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_turn2(&self, _req: &PromptRequest) -> Result<Turn2Response, LlmError> {
        Ok(Turn2Response {
            selection: CommentSelection {
                target_slot_id: self.target_slot_id,
                comment: "that echoes what I felt".to_string(),
                voice_profile: VoiceProfile::WarmProfessional,
            },
        })
    }

    async fn generate_turn3(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "glad we're resonating together".to_string(), voice_profile: VoiceProfile::FriendlyCasual })
    }

    async fn generate_turn4(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "a shared quiet settles over six voices".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_sentiment(&self, _req: &PromptRequest) -> Result<SentimentResponse, LlmError> {
        Ok(SentimentResponse { sentiment: "neutral".to_string(), justification: "steady tone".to_string() })
    }
}

/// Every slot rejects every comment by targeting itself, which the engine
/// must reject and drop (no slot is ever allowed to comment on itself).
struct SelfTargetingLlm;

#[async_trait]
impl LlmClient for SelfTargetingLlm {
    async fn generate_turn1(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "a single steady tone".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_turn2(&self, req: &PromptRequest) -> Result<Turn2Response, LlmError> {
        // The prompt embeds the slot's own id; this fake doesn't parse it
        // out, so tests using this fake only ever use a single slot, making
        // "target self" unambiguous regardless of which slot called in.
        let _ = req;
        Ok(Turn2Response {
            selection: CommentSelection {
                target_slot_id: 3,
                comment: "echo".to_string(),
                voice_profile: VoiceProfile::WarmProfessional,
            },
        })
    }

    async fn generate_turn3(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "unreachable in single-slot tests".to_string(), voice_profile: VoiceProfile::FriendlyCasual })
    }

    async fn generate_turn4(&self, _req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        Ok(SpokenResponse { text: "a closing hum".to_string(), voice_profile: VoiceProfile::CalmSoothing })
    }

    async fn generate_sentiment(&self, _req: &PromptRequest) -> Result<SentimentResponse, LlmError> {
        Ok(SentimentResponse { sentiment: "neutral".to_string(), justification: "n/a".to_string() })
    }
}

/// Writes a short real WAV file instead of calling a vendor, so the
/// decomposition worker pool has real audio to decompose.
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
        let samples: Vec<f32> = (0..n).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        resonance_audio::wav::write_mono_wav(output_path, &samples, 16_000)?;
        Ok(())
    }
}

fn assignments(slot_ids: &[u8]) -> Vec<SlotAssignment> {
    let agents = Agent::default_roster();
    slot_ids
        .iter()
        .enumerate()
        .map(|(i, &slot)| SlotAssignment {
            slot_id: SlotId::new(slot).unwrap(),
            agent_id: agents[i % agents.len()].id.clone(),
        })
        .collect()
}

/// Deletes its backing directory when dropped, mirroring the teacher's
/// test-fixture cleanup style without pulling in a tempdir crate.
struct TestArtifactsDir(std::path::PathBuf);

impl Drop for TestArtifactsDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

async fn build_engine(llm: Arc<dyn LlmClient>, summary_enabled: bool) -> (Arc<Engine>, TestArtifactsDir) {
    let path = std::env::temp_dir().join(format!("resonance-engine-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&path).await.unwrap();
    let dir = TestArtifactsDir(path.clone());

    let mut settings = Settings::default();
    settings.summary_enabled = summary_enabled;
    settings.sentiment_enabled = false;
    settings.waves_max_workers = 2;
    settings.waves_queue_max_size = 32;
    settings.waves_job_timeout_s = 10.0;
    settings.events_workflow_timeout_s = 5.0;
    settings.artifacts_dir = path.to_string_lossy().into_owned();
    let settings = Arc::new(settings);

    let (orchestrator, results_tx) =
        Orchestrator::spawn(path.clone(), Duration::from_secs_f64(settings.events_workflow_timeout_s));
    let worker_pool = Arc::new(WorkerPool::new(
        settings.waves_max_workers,
        settings.waves_queue_max_size,
        Duration::from_secs_f64(settings.waves_job_timeout_s),
        results_tx,
    ));
    let conversations = Arc::new(FakeConversationStore::default());
    let agents: Arc<[Agent]> = Agent::default_roster().into();

    let engine = Arc::new(Engine::new(
        llm,
        Arc::new(FakeTts),
        worker_pool,
        orchestrator,
        conversations,
        settings,
        agents,
        path,
    ));

    (engine, dir)
}

async fn drain(mut rx: UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(15), rx.recv()).await.ok().flatten() {
        events.push(event);
    }
    events
}

fn names(events: &[EngineEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name).collect()
}

/// S1: a single-slot broadcast runs Turn 1 and Turn 2 to completion, skips
/// Turn 3 (no self-comments are ever routed), and still emits `done`.
#[tokio::test(flavor = "multi_thread")]
async fn single_slot_happy_path_skips_turn_three() {
    let (engine, _dir) = build_engine(Arc::new(FixedTargetLlm { target_slot_id: 2 }), true).await;
    let request = BroadcastRequest {
        session_id: uuid::Uuid::new_v4(),
        slots: assignments(&[3]),
        user_message: "hi".to_string(),
    };

    let events = drain(engine.run_broadcast(request)).await;
    let event_names = names(&events);

    assert_eq!(event_names.first(), Some(&"turn.start"));
    assert_eq!(event_names.last(), Some(&"done"));
    assert!(event_names.contains(&"slot.done"));
    assert!(event_names.contains(&"slot.audio"));

    // Turn 1 then Turn 2 run; Turn 3 never starts (the lone slot can't
    // comment on itself, so nothing is ever routed to it).
    let turn_starts: Vec<_> = events
        .iter()
        .filter(|e| e.name == "turn.start")
        .map(|e| e.data["turn"].as_i64().unwrap())
        .collect();
    assert!(turn_starts.contains(&1));
    assert!(turn_starts.contains(&2));
    assert!(!turn_starts.contains(&3), "turn 3 must be skipped with no routed comments");
}

/// Self-targeted comments are rejected and the slot is excluded from
/// Turn 3 (no dialogue could ever target it from itself).
#[tokio::test(flavor = "multi_thread")]
async fn self_targeted_comment_is_rejected() {
    let (engine, _dir) = build_engine(Arc::new(SelfTargetingLlm), false).await;
    let request = BroadcastRequest {
        session_id: uuid::Uuid::new_v4(),
        slots: assignments(&[3]),
        user_message: "hi".to_string(),
    };

    let events = drain(engine.run_broadcast(request)).await;
    let has_turn2_error = events
        .iter()
        .any(|e| e.name == "slot.error" && e.data["turn"] == 2);
    assert!(has_turn2_error, "self-targeted comment must surface as a slot.error");
}

/// S2: six slots, all succeed. Every turn runs, every slot reports
/// exactly one of slot.done/slot.error for each turn it participates in.
#[tokio::test(flavor = "multi_thread")]
async fn six_slots_all_succeed_runs_all_turns() {
    let (engine, _dir) = build_engine(Arc::new(FixedTargetLlm { target_slot_id: 2 }), true).await;
    let request = BroadcastRequest {
        session_id: uuid::Uuid::new_v4(),
        slots: assignments(&[1, 2, 3, 4, 5, 6]),
        user_message: "what do you notice".to_string(),
    };

    let events = drain(engine.run_broadcast(request)).await;
    let event_names = names(&events);

    let turn1_done_count =
        events.iter().filter(|e| e.name == "turn.done" && e.data["turn"] == 1).count();
    assert_eq!(turn1_done_count, 1);

    let turn1_slot_count = events
        .iter()
        .find(|e| e.name == "turn.done" && e.data["turn"] == 1)
        .map(|e| e.data["slotCount"].as_i64().unwrap())
        .unwrap();
    assert_eq!(turn1_slot_count, 6);

    // Every slot targets slot 2 (FixedTargetLlm), so slot 2 alone receives
    // routed comments and Turn 3 has exactly one participant.
    let turn3_started = event_names.iter().any(|n| *n == "turn.start")
        && events.iter().any(|e| e.name == "turn.start" && e.data["turn"] == 3);
    assert!(turn3_started, "slot 2 should have received comments, starting turn 3");

    assert_eq!(event_names.last(), Some(&"done"));
}

/// Property 1: for every slot with Turn-1 success, exactly one of
/// `slot.done`/`slot.error` with `turn=1` appears.
#[tokio::test(flavor = "multi_thread")]
async fn exactly_one_turn1_result_event_per_slot() {
    let (engine, _dir) = build_engine(Arc::new(FixedTargetLlm { target_slot_id: 2 }), false).await;
    let request = BroadcastRequest {
        session_id: uuid::Uuid::new_v4(),
        slots: assignments(&[1, 2, 3, 4]),
        user_message: "hello".to_string(),
    };

    let events = drain(engine.run_broadcast(request)).await;
    let mut seen: HashMap<u8, usize> = HashMap::new();
    for event in &events {
        if event.data.get("turn").and_then(|t| t.as_i64()) == Some(1)
            && (event.name == "slot.done" || event.name == "slot.error")
        {
            let slot = event.data["slotId"].as_u64().unwrap() as u8;
            *seen.entry(slot).or_default() += 1;
        }
    }
    for slot in [1, 2, 3, 4] {
        assert_eq!(seen.get(&slot).copied().unwrap_or(0), 1, "slot {slot} should report exactly one turn-1 result");
    }
}

/// Ordering guarantee: per-turn `turn.start` precedes its `slot.*` events,
/// which precede that turn's `turn.done`; turns never interleave.
#[tokio::test(flavor = "multi_thread")]
async fn turn_events_are_strictly_ordered() {
    let (engine, _dir) = build_engine(Arc::new(FixedTargetLlm { target_slot_id: 2 }), false).await;
    let request = BroadcastRequest {
        session_id: uuid::Uuid::new_v4(),
        slots: assignments(&[1, 2, 3]),
        user_message: "hello".to_string(),
    };

    let events = drain(engine.run_broadcast(request)).await;
    let mut current_turn: Option<i64> = None;
    let mut turn_closed: HashMap<i64, bool> = HashMap::new();

    for event in &events {
        let Some(turn) = event.data.get("turn").and_then(|t| t.as_i64()) else { continue };
        match event.name {
            "turn.start" => {
                assert_ne!(turn_closed.get(&turn), Some(&true), "turn {turn} restarted after being closed");
                current_turn = Some(turn);
            }
            "turn.done" => {
                assert_eq!(current_turn, Some(turn), "turn.done for {turn} outside its own turn");
                turn_closed.insert(turn, true);
            }
            "slot.start" | "slot.done" | "slot.error" | "slot.audio" => {
                assert_eq!(current_turn, Some(turn), "slot event for turn {turn} arrived outside that turn's window");
            }
            _ => {}
        }
    }

    assert_eq!(events.last().unwrap().name, "done");
}
