use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use resonance_core::{Dialogue, DecomposeResult, SlotId, SlotMeta, SUMMARY_TURN_INDEX};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::Command;
use crate::envelope::EventEnvelope;
use crate::sink::ControllerSink;
use crate::state::{SessionEventsState, SlotWaveInfo, SummaryWaveInfo};

/// Cheaply-cloned handle the turn engine and request surface use to talk to
/// the orchestrator's consumer task. All mutation happens inside that task
/// (Design Notes: "engine to orchestrator communication is by message
/// passing, not shared state").
#[derive(Clone)]
pub struct Orchestrator {
    command_tx: mpsc::Sender<Command>,
    workflow_timeout: Duration,
}

impl Orchestrator {
    /// Spawns the consumer task and returns a handle plus the sender end of
    /// the decomposition-result channel the worker pool should be given.
    pub fn spawn(
        artifacts_root: PathBuf,
        workflow_timeout: Duration,
    ) -> (Self, mpsc::UnboundedSender<DecomposeResult>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let handle = Self { command_tx: command_tx.clone(), workflow_timeout };

        tokio::spawn(run_consumer(artifacts_root, command_tx, command_rx, results_rx));

        (handle, results_tx)
    }

    pub async fn session_start(&self, session_id: Uuid, turn1_expected: Vec<SlotId>) {
        let _ = self.command_tx.send(Command::SessionStart { session_id, turn1_expected }).await;
    }

    /// Records which slots actually entered Turn 2 once Turn 1 has settled —
    /// this can't be known at `session_start` time since only successful
    /// Turn-1 slots participate.
    pub async fn turn1_settled(&self, session_id: Uuid, turn2_expected: Vec<SlotId>) {
        let _ = self.command_tx.send(Command::Turn1Settled { session_id, turn2_expected }).await;
    }

    /// Arms the workflow timeout and finalizes the dialogue set. Call once,
    /// after Turn 3 settles.
    pub async fn turn3_settled(&self, session_id: Uuid, turn3_expected: Vec<SlotId>, dialogues: Vec<Dialogue>) {
        let _ = self.command_tx.send(Command::Turn3Settled { session_id, turn3_expected, dialogues }).await;

        let tx = self.command_tx.clone();
        let timeout = self.workflow_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Command::WorkflowTimeout { session_id }).await;
        });
    }

    pub async fn user_sentiment(&self, session_id: Uuid, sentiment: String, justification: String) {
        let _ = self.command_tx.send(Command::UserSentiment { session_id, sentiment, justification }).await;
    }

    /// Records the summary's text/voice profile once Turn 4's LLM+TTS call
    /// succeeds. `final_summary.ready` is emitted once this and the matching
    /// decomposition result (delivered over the results channel) have both
    /// arrived, in whichever order.
    pub async fn summary_text_ready(&self, session_id: Uuid, text: String, voice_profile: String) {
        let _ = self.command_tx.send(Command::SummaryTextReady { session_id, text, voice_profile }).await;
    }

    /// Attaches a new controller connection, replacing (and closing) any
    /// existing one.
    pub async fn attach_controller(&self, sink: Box<dyn ControllerSink>) {
        let _ = self.command_tx.send(Command::AttachController { sink }).await;
    }
}

async fn run_consumer(
    artifacts_root: PathBuf,
    self_tx: mpsc::Sender<Command>,
    mut command_rx: mpsc::Receiver<Command>,
    mut results_rx: mpsc::UnboundedReceiver<DecomposeResult>,
) {
    let mut sessions: HashMap<Uuid, SessionEventsState> = HashMap::new();
    let controller: Arc<Mutex<Option<Box<dyn ControllerSink>>>> = Arc::new(Mutex::new(None));
    let _ = self_tx;

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                match command {
                    Some(command) => {
                        handle_command(command, &artifacts_root, &mut sessions, &controller).await;
                    }
                    None => {
                        info!("orchestrator command channel closed, shutting down");
                        return;
                    }
                }
            }
            result = results_rx.recv() => {
                match result {
                    Some(result) => handle_decompose_result(result, &artifacts_root, &mut sessions, &controller).await,
                    None => {
                        info!("orchestrator results channel closed");
                    }
                }
            }
        }
    }
}

async fn handle_command(
    command: Command,
    artifacts_root: &PathBuf,
    sessions: &mut HashMap<Uuid, SessionEventsState>,
    controller: &Arc<Mutex<Option<Box<dyn ControllerSink>>>>,
) {
    match command {
        Command::SessionStart { session_id, turn1_expected } => {
            sessions.insert(session_id, SessionEventsState::new(turn1_expected));
        }
        Command::Turn1Settled { session_id, turn2_expected } => {
            if let Some(state) = sessions.get_mut(&session_id) {
                state.turn2_expected = turn2_expected.into_iter().collect();
                maybe_emit_batch(session_id, artifacts_root, sessions, controller, false).await;
            }
        }
        Command::Turn3Settled { session_id, turn3_expected, dialogues } => {
            if let Some(state) = sessions.get_mut(&session_id) {
                state.turn3_expected = turn3_expected.into_iter().collect();
                state.dialogues = dialogues;
                state.workflow_complete = true;
                maybe_emit_batch(session_id, artifacts_root, sessions, controller, false).await;
            }
        }
        Command::WorkflowTimeout { session_id } => {
            maybe_emit_batch(session_id, artifacts_root, sessions, controller, true).await;
        }
        Command::UserSentiment { session_id, sentiment, justification } => {
            if let Some(state) = sessions.get_mut(&session_id) {
                let seq = state.next_seq();
                let envelope = EventEnvelope::new(
                    "user_sentiment",
                    session_id,
                    seq,
                    json!({ "sentiment": sentiment, "justification": justification }),
                );
                send_envelope(controller, envelope).await;
            }
        }
        Command::SummaryTextReady { session_id, text, voice_profile } => {
            if let Some(state) = sessions.get_mut(&session_id) {
                state.pending_summary_text = Some((text, voice_profile));
            }
            maybe_emit_summary(session_id, sessions, controller).await;
        }
        Command::AttachController { sink } => {
            let mut guard = controller.lock().await;
            if let Some(mut previous) = guard.take() {
                previous.close(1000, "replaced").await;
            }
            *guard = Some(sink);
        }
    }
}

async fn handle_decompose_result(
    result: DecomposeResult,
    artifacts_root: &PathBuf,
    sessions: &mut HashMap<Uuid, SessionEventsState>,
    controller: &Arc<Mutex<Option<Box<dyn ControllerSink>>>>,
) {
    let job = &result.job;
    let session_id = job.session_id;
    let Some(state) = sessions.get_mut(&session_id) else {
        warn!(%session_id, "decomposition result for unknown session");
        return;
    };

    if !result.success {
        return;
    }

    if job.turn_index == SUMMARY_TURN_INDEX {
        let waves: Vec<SummaryWaveInfo> = result
            .wave_paths
            .iter()
            .enumerate()
            .filter_map(|(k, path)| {
                SlotId::new((k + 1) as u8).ok().map(|slot_id| SummaryWaveInfo::from_path(slot_id, path, artifacts_root))
            })
            .collect();
        state.summary_waves = Some(waves);
        maybe_emit_summary(session_id, sessions, controller).await;
        return;
    }

    let meta = SlotMeta {
        slot_id: job.slot_id,
        agent_id: job.agent_id.clone(),
        voice_profile: job.voice_profile.clone(),
        tts_basename: job.tts_basename.clone(),
    };

    match job.turn_index {
        1 => {
            state.turn1_ready.insert(job.slot_id, meta);
        }
        2 => {
            state.turn2_ready.insert(job.slot_id, meta);
        }
        3 => {
            state.turn3_ready.insert(job.slot_id, meta);
        }
        _ => {}
    }

    maybe_emit_batch(session_id, artifacts_root, sessions, controller, false).await;
}

/// `final_summary.ready` is the last event of a session (§5): emitted once
/// both the summary text (from the engine) and its decomposed wave paths
/// (from the worker pool) have arrived, whichever comes second.
async fn maybe_emit_summary(
    session_id: Uuid,
    sessions: &mut HashMap<Uuid, SessionEventsState>,
    controller: &Arc<Mutex<Option<Box<dyn ControllerSink>>>>,
) {
    let Some(state) = sessions.get_mut(&session_id) else { return };
    if state.summary_emitted {
        return;
    }
    let (Some((text, voice_profile)), Some(waves)) =
        (state.pending_summary_text.clone(), state.summary_waves.clone())
    else {
        return;
    };

    let seq = state.next_seq();
    let envelope = EventEnvelope::new(
        "final_summary.ready",
        session_id,
        seq,
        json!({
            "status": "complete",
            "text": text,
            "waveInfo": { "voiceProfile": voice_profile, "waves": waves },
        }),
    );
    send_envelope(controller, envelope).await;
    state.summary_emitted = true;
}

async fn maybe_emit_batch(
    session_id: Uuid,
    artifacts_root: &PathBuf,
    sessions: &mut HashMap<Uuid, SessionEventsState>,
    controller: &Arc<Mutex<Option<Box<dyn ControllerSink>>>>,
    force: bool,
) {
    let Some(state) = sessions.get_mut(&session_id) else { return };
    if state.batch_emitted {
        return;
    }
    if !force && !state.is_all_ready() {
        return;
    }
    if force && !state.workflow_complete {
        return;
    }

    let missing = state.missing_turn1_slots();
    let status = if missing.is_empty() { "complete" } else { "partial" };
    let mut slot_infos: Vec<SlotWaveInfo> = state
        .turn1_ready
        .values()
        .map(|m| SlotWaveInfo::derive(m, artifacts_root, session_id, 1))
        .collect();
    slot_infos.sort_by_key(|s| s.slot_id);

    let seq = state.next_seq();
    let envelope = EventEnvelope::new(
        "turn1.waves.ready",
        session_id,
        seq,
        json!({
            "turnIndex": 1,
            "status": status,
            "slotsExpected": state.turn1_expected.len(),
            "slotsReady": state.turn1_ready.len(),
            "slots": slot_infos,
            "missingSlotIds": missing,
        }),
    );
    send_envelope(controller, envelope).await;

    let mut dialogues = state.dialogues.clone();
    dialogues.sort_by_key(|d| d.target_slot_id);
    for dialogue in &dialogues {
        if !state.dialogue_is_ready(dialogue) {
            continue;
        }

        let commenters: Vec<SlotWaveInfo> = dialogue
            .commenters
            .iter()
            .map(|m| SlotWaveInfo::derive(m, artifacts_root, session_id, 2))
            .collect();
        let respondent = SlotWaveInfo::derive(&dialogue.respondent, artifacts_root, session_id, 3);
        let play_order: Vec<_> = dialogue
            .play_order()
            .into_iter()
            .map(|item| json!({ "role": item.role, "slotId": item.slot_id }))
            .collect();

        let seq = state.next_seq();
        let envelope = EventEnvelope::new(
            "dialogue.waves.ready",
            session_id,
            seq,
            json!({
                "dialogueId": dialogue.dialogue_id,
                "turns": [2, 3],
                "targetSlotId": dialogue.target_slot_id,
                "commenters": commenters,
                "respondent": respondent,
                "playOrder": play_order,
            }),
        );
        send_envelope(controller, envelope).await;
    }

    state.batch_emitted = true;
}

async fn send_envelope(controller: &Arc<Mutex<Option<Box<dyn ControllerSink>>>>, envelope: EventEnvelope) {
    let mut guard = controller.lock().await;
    if let Some(sink) = guard.as_mut() {
        if !sink.send_text(envelope.to_text()).await {
            warn!(event_type = %envelope.event_type, "controller send failed, dropping socket");
            *guard = None;
        }
    } else {
        warn!(event_type = %envelope.event_type, "no controller attached, dropping event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resonance_core::{DecomposeJob, SlotId};
    use std::sync::Mutex as StdMutex;
    use tokio::time::Duration as TokioDuration;

    struct RecordingSink {
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl ControllerSink for RecordingSink {
        async fn send_text(&mut self, text: String) -> bool {
            self.sent.lock().unwrap().push(text);
            true
        }
        async fn close(&mut self, _code: u16, _reason: &str) {}
    }

    fn job(session_id: Uuid, turn_index: i32, slot: u8) -> DecomposeJob {
        DecomposeJob {
            session_id,
            turn_index,
            slot_id: SlotId::new(slot).unwrap(),
            agent_id: format!("agent-{slot}"),
            voice_profile: "warm_professional".to_string(),
            tts_basename: format!("slot-{slot}"),
            input_path: std::path::PathBuf::from("in.wav"),
            output_dir: std::path::PathBuf::from("out"),
            target_slot_id: None,
            n_waves: 3,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn seq_is_strictly_increasing_and_batch_emits_once() {
        let session_id = Uuid::new_v4();
        let (orchestrator, results_tx) =
            Orchestrator::spawn(PathBuf::from("/tmp/artifacts"), Duration::from_secs(60));

        let sent = Arc::new(StdMutex::new(Vec::new()));
        orchestrator.attach_controller(Box::new(RecordingSink { sent: sent.clone() })).await;

        let slot = SlotId::new(3).unwrap();
        orchestrator.session_start(session_id, vec![slot]).await;
        orchestrator.turn1_settled(session_id, vec![]).await;
        orchestrator.turn3_settled(session_id, vec![], vec![]).await;

        let mut result = DecomposeResult::failure(job(session_id, 1, 3), "placeholder", 1.0);
        result.success = true;
        results_tx.send(result).unwrap();

        tokio::time::sleep(TokioDuration::from_millis(100)).await;

        let sent_events = sent.lock().unwrap().clone();
        assert_eq!(sent_events.len(), 1, "exactly one turn1.waves.ready, no dialogues expected");

        let seqs: Vec<u64> = sent_events
            .iter()
            .map(|s| serde_json::from_str::<serde_json::Value>(s).unwrap()["seq"].as_u64().unwrap())
            .collect();
        for window in seqs.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn workflow_timeout_emits_partial_batch_exactly_once() {
        let session_id = Uuid::new_v4();
        let (orchestrator, _results_tx) =
            Orchestrator::spawn(PathBuf::from("/tmp/artifacts"), Duration::from_millis(20));

        let sent = Arc::new(StdMutex::new(Vec::new()));
        orchestrator.attach_controller(Box::new(RecordingSink { sent: sent.clone() })).await;

        let slot = SlotId::new(5).unwrap();
        orchestrator.session_start(session_id, vec![slot]).await;
        orchestrator.turn1_settled(session_id, vec![]).await;
        orchestrator.turn3_settled(session_id, vec![], vec![]).await;

        tokio::time::sleep(TokioDuration::from_millis(200)).await;

        let sent_events = sent.lock().unwrap().clone();
        assert_eq!(sent_events.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&sent_events[0]).unwrap();
        assert_eq!(parsed["payload"]["status"], "partial");
        assert_eq!(parsed["payload"]["missingSlotIds"], json!([5]));
    }
}
