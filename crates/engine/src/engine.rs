//! Turn Engine (C5): the four-turn state machine.
//!
//! One `Engine::run_broadcast` call per request, executed on its own Tokio
//! task so the SSE consumer and the engine's continued execution are
//! decoupled (a dropped SSE receiver never cancels the workflow — it keeps
//! running to `FINALIZE` so the controller channel still gets its events).
//! Grounded in `original_source/backend/workflow.py`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use resonance_audio::TtsClient;
use resonance_config::Settings;
use resonance_core::{
    Agent, AgentId, Conversation, ConversationAccess, ConversationEntry, DecomposeJob, Dialogue,
    ErrorKind, Outcome, ReceivedComment, Role, SlotAssignment, SlotId, SlotMeta, TurnResult,
    WorkflowState, SUMMARY_TURN_INDEX,
};
use resonance_events::Orchestrator;
use resonance_llm::{LlmClient, Message, PromptRequest};
use resonance_session::{manifest, paths as session_paths, Manifest, TtsSession};
use resonance_worker::WorkerPool;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::comments::route_comments;
use crate::event::EngineEvent;
use crate::prompts::{self, PeerResponse};

const NORMAL_TURN_N_WAVES: usize = 2;
const SUMMARY_N_WAVES: usize = 6;

/// One broadcast (`POST /v1/chat`) invocation.
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub session_id: Uuid,
    pub slots: Vec<SlotAssignment>,
    pub user_message: String,
}

pub struct Engine {
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    worker_pool: Arc<WorkerPool>,
    orchestrator: Orchestrator,
    conversations: Arc<dyn ConversationAccess>,
    settings: Arc<Settings>,
    agents: Arc<[Agent]>,
    artifacts_dir: PathBuf,
}

impl Engine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        worker_pool: Arc<WorkerPool>,
        orchestrator: Orchestrator,
        conversations: Arc<dyn ConversationAccess>,
        settings: Arc<Settings>,
        agents: Arc<[Agent]>,
        artifacts_dir: PathBuf,
    ) -> Self {
        Self { llm, tts, worker_pool, orchestrator, conversations, settings, agents, artifacts_dir }
    }

    /// Spawns the workflow and returns the SSE event stream's receiving end
    /// immediately; the engine keeps running after the receiver is dropped.
    pub fn run_broadcast(self: Arc<Self>, request: BroadcastRequest) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            self.execute(request, tx).await;
        });
        rx
    }

    fn agent_for(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == agent_id)
    }

    fn emit(tx: &mpsc::UnboundedSender<EngineEvent>, name: &'static str, data: serde_json::Value) {
        let _ = tx.send(EngineEvent::new(name, data));
    }

    async fn execute(self: Arc<Self>, request: BroadcastRequest, tx: mpsc::UnboundedSender<EngineEvent>) {
        let session_id = request.session_id;
        let tts_session = TtsSession::new(&self.artifacts_dir, session_id);
        if let Err(err) = tts_session.ensure_layout().await {
            warn!(%session_id, %err, "failed to create tts session layout");
        }

        let mut manifest = Manifest::new(session_id.to_string(), Utc::now().to_rfc3339());
        let mut state = WorkflowState::new(session_id, request.slots.clone(), request.user_message.clone());

        self.orchestrator
            .session_start(session_id, request.slots.iter().map(|s| s.slot_id).collect())
            .await;

        let sentiment_handle = self.clone().spawn_sentiment(request.user_message.clone());

        // --- Turn 1 (Reflect) ---
        Self::emit(&tx, "turn.start", json!({ "turn": 1 }));
        let turn1_results = self.run_turn1(&tts_session, &state.slots, &request.user_message, &tx).await;
        let turn1_success_count = turn1_results.iter().filter(|r| r.outcome().success).count();
        Self::emit(&tx, "turn.done", json!({ "turn": 1, "slotCount": turn1_success_count }));
        self.append_turn1_manifest(&mut manifest, &turn1_results, &tts_session);
        state.turn1_results = turn1_results;

        let turn1_successes = state.successful_turn1_slots();
        self.orchestrator.turn1_settled(session_id, turn1_successes.clone()).await;

        if let Some(handle) = sentiment_handle {
            if let Ok(Ok(Some(result))) = tokio::time::timeout(Duration::from_secs(1), handle).await {
                self.orchestrator.user_sentiment(session_id, result.sentiment, result.justification).await;
            }
        }

        // --- Turn 2 (Comment) ---
        let mut turn2_slotmeta: HashMap<SlotId, SlotMeta> = HashMap::new();
        let mut turn2_results = Vec::new();
        if !turn1_successes.is_empty() {
            Self::emit(&tx, "turn.start", json!({ "turn": 2 }));
            turn2_results =
                self.run_turn2(&tts_session, &state, &turn1_successes, &mut turn2_slotmeta, &tx).await;
            let count = turn2_results.iter().filter(|r| r.outcome().success).count();
            Self::emit(&tx, "turn.done", json!({ "turn": 2, "slotCount": count }));
        }
        self.append_turn2_manifest(&mut manifest, &turn2_results, &tts_session);
        state.turn2_results = turn2_results;

        let comments_by_target = route_comments(&state.turn2_results);
        state.comments_by_target = comments_by_target.clone();

        let mut turn3_targets: Vec<SlotId> = comments_by_target
            .keys()
            .filter(|target| state.slots.iter().any(|s| s.slot_id == **target))
            .copied()
            .collect();
        turn3_targets.sort();

        // --- Turn 3 (Reply) ---
        let mut turn3_slotmeta: HashMap<SlotId, SlotMeta> = HashMap::new();
        let mut turn3_results = Vec::new();
        if !turn3_targets.is_empty() {
            Self::emit(&tx, "turn.start", json!({ "turn": 3 }));
            turn3_results = self
                .run_turn3(&tts_session, &state, &turn3_targets, &comments_by_target, &mut turn3_slotmeta, &tx)
                .await;
            let count = turn3_results.iter().filter(|r| r.outcome().success).count();
            Self::emit(&tx, "turn.done", json!({ "turn": 3, "slotCount": count }));
        }
        self.append_turn3_manifest(&mut manifest, &turn3_results, &comments_by_target, &tts_session);
        state.turn3_results = turn3_results;

        let dialogues = build_dialogues(&comments_by_target, &turn2_slotmeta, &turn3_slotmeta);
        let turn3_expected: Vec<SlotId> =
            turn3_results.iter().filter_map(|r| r.slot_id()).collect();
        self.orchestrator.turn3_settled(session_id, turn3_expected, dialogues).await;

        // --- Turn 4 (Summary), optional ---
        if self.settings.summary_enabled {
            Self::emit(&tx, "turn.start", json!({ "turn": 4 }));
            let summary_result = self.run_summary(&tts_session, &request.user_message).await;
            let succeeded = summary_result.as_ref().map(|r| r.outcome().success).unwrap_or(false);
            Self::emit(&tx, "turn.done", json!({ "turn": 4, "slotCount": if succeeded { 1 } else { 0 } }));
            self.append_summary_manifest(&mut manifest, &summary_result, &tts_session);
            state.summary_result = summary_result;
        }

        if let Err(err) = manifest.write(&manifest::manifest_path(&tts_session.root_dir)).await {
            warn!(%session_id, %err, "failed to write session manifest");
        }

        Self::emit(&tx, "done", json!({ "sessionId": session_id }));
    }

    fn spawn_sentiment(
        self: Arc<Self>,
        user_message: String,
    ) -> Option<tokio::task::JoinHandle<Option<resonance_llm::SentimentResponse>>> {
        if !self.settings.sentiment_enabled {
            return None;
        }
        Some(tokio::spawn(async move {
            let prompt = prompts::render_sentiment_prompt(&user_message);
            let req = PromptRequest {
                model: self.settings.sentiment_model.clone(),
                messages: vec![Message::user(prompt)],
                temperature: self.settings.sentiment_temperature,
                max_tokens: self.settings.sentiment_max_tokens,
                timeout: Duration::from_secs_f64(self.settings.sentiment_timeout_s),
                max_retries: 1,
            };
            let timeout = Duration::from_secs_f64(self.settings.sentiment_timeout_s);
            match tokio::time::timeout(timeout, self.llm.generate_sentiment(&req)).await {
                Ok(Ok(result)) => Some(result),
                _ => None,
            }
        }))
    }

    async fn run_turn1(
        self: &Arc<Self>,
        tts_session: &TtsSession,
        slots: &[SlotAssignment],
        user_message: &str,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> Vec<TurnResult> {
        let tasks = slots.iter().cloned().map(|assignment| {
            let engine = self.clone();
            let tts_session = tts_session.clone();
            let user_message = user_message.to_string();
            let tx = tx.clone();
            tokio::spawn(async move { engine.run_turn1_slot(&tts_session, assignment, &user_message, &tx).await })
        });
        join_all(tasks).await.into_iter().filter_map(Result::ok).collect()
    }

    async fn run_turn1_slot(
        &self,
        tts_session: &TtsSession,
        assignment: SlotAssignment,
        user_message: &str,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> TurnResult {
        let slot_id = assignment.slot_id;
        Self::emit(tx, "slot.start", json!({ "turn": 1, "slotId": slot_id, "agentId": assignment.agent_id }));

        let Some(agent) = self.agent_for(&assignment.agent_id) else {
            Self::emit(
                tx,
                "slot.error",
                json!({ "turn": 1, "slotId": slot_id, "errorType": "server_error", "message": "unknown agent" }),
            );
            return failed_response(slot_id, assignment.agent_id);
        };

        let prompt_text = prompts::render_turn1_prompt(user_message);
        let mut conversation = self.conversations.get_or_create(slot_id, &self.settings.default_system_prompt);
        conversation.push(ConversationEntry::user(prompt_text.clone()));
        self.conversations.append(slot_id, ConversationEntry::user(prompt_text));

        let req = self.build_request(agent, &conversation);
        match self.llm.generate_turn1(&req).await {
            Ok(response) => {
                self.conversations.append(slot_id, ConversationEntry::assistant(spoken_to_json(&response)));
                Self::emit(
                    tx,
                    "slot.done",
                    json!({ "turn": 1, "slotId": slot_id, "agentId": agent.id, "text": response.text, "voiceProfile": response.voice_profile.as_str() }),
                );

                let voice_profile = response.voice_profile.as_str();
                let basename = session_paths::turn1_basename(slot_id.get(), &agent.id, voice_profile);
                let audio_path = tts_session.turn1_path(slot_id.get(), &agent.id, voice_profile);

                match self.tts.synthesize_to_file(&response.text, response.voice_profile, &audio_path).await {
                    Ok(()) => {
                        let rel = relative_path(tts_session, &audio_path, &self.artifacts_dir);
                        Self::emit(tx, "slot.audio", json!({ "turn": 1, "slotId": slot_id, "audioPath": rel }));
                        self.submit_decompose(
                            tts_session.session_id,
                            1,
                            slot_id,
                            &agent.id,
                            voice_profile,
                            &basename,
                            &audio_path,
                            Some(slot_id),
                            NORMAL_TURN_N_WAVES,
                        );
                        TurnResult::Response {
                            slot_id,
                            agent_id: agent.id.clone(),
                            text: response.text,
                            voice_profile: voice_profile.to_string(),
                            outcome: Outcome { success: true, audio_rel_path: Some(rel) },
                        }
                    }
                    Err(err) => {
                        Self::emit(
                            tx,
                            "slot.error",
                            json!({ "turn": 1, "slotId": slot_id, "errorType": "tts_error", "message": err.to_string() }),
                        );
                        TurnResult::Response {
                            slot_id,
                            agent_id: agent.id.clone(),
                            text: response.text,
                            voice_profile: voice_profile.to_string(),
                            outcome: Outcome { success: true, audio_rel_path: None },
                        }
                    }
                }
            }
            Err(err) => {
                let kind = ErrorKind::classify(&err.to_string());
                Self::emit(
                    tx,
                    "slot.error",
                    json!({ "turn": 1, "slotId": slot_id, "errorType": kind, "message": err.to_string() }),
                );
                failed_response(slot_id, agent.id.clone())
            }
        }
    }

    async fn run_turn2(
        self: &Arc<Self>,
        tts_session: &TtsSession,
        state: &WorkflowState,
        successes: &[SlotId],
        turn2_slotmeta: &mut HashMap<SlotId, SlotMeta>,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> Vec<TurnResult> {
        let peers: Vec<PeerResponse> = state
            .turn1_results
            .iter()
            .filter_map(|r| {
                if let TurnResult::Response { slot_id, agent_id, text, outcome, .. } = r {
                    outcome.success.then(|| PeerResponse { slot_id: slot_id.get(), agent_id: agent_id.clone(), text: text.clone() })
                } else {
                    None
                }
            })
            .collect();

        let participants: Vec<SlotAssignment> =
            state.slots.iter().filter(|s| successes.contains(&s.slot_id)).cloned().collect();

        let tasks = participants.into_iter().map(|assignment| {
            let engine = self.clone();
            let tts_session = tts_session.clone();
            let mut peer_list: Vec<PeerResponse> =
                peers.iter().filter(|p| p.slot_id != assignment.slot_id.get()).map(|p| PeerResponse {
                    slot_id: p.slot_id,
                    agent_id: p.agent_id.clone(),
                    text: p.text.clone(),
                }).collect();
            use rand::seq::SliceRandom;
            peer_list.shuffle(&mut rand::thread_rng());
            let tx = tx.clone();
            tokio::spawn(async move { engine.run_turn2_slot(&tts_session, assignment, peer_list, &tx).await })
        });

        let results: Vec<TurnResult> = join_all(tasks).await.into_iter().filter_map(Result::ok).collect();

        for result in &results {
            if let TurnResult::Comment { slot_id, agent_id, voice_profile, target_slot_id, outcome, .. } = result {
                if outcome.success {
                    let basename =
                        session_paths::turn2_basename(slot_id.get(), target_slot_id.get(), agent_id, voice_profile);
                    turn2_slotmeta.insert(
                        *slot_id,
                        SlotMeta {
                            slot_id: *slot_id,
                            agent_id: agent_id.clone(),
                            voice_profile: voice_profile.clone(),
                            tts_basename: basename,
                        },
                    );
                }
            }
        }

        results
    }

    async fn run_turn2_slot(
        &self,
        tts_session: &TtsSession,
        assignment: SlotAssignment,
        peers: Vec<PeerResponse>,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> TurnResult {
        let slot_id = assignment.slot_id;
        Self::emit(tx, "slot.start", json!({ "turn": 2, "slotId": slot_id, "agentId": assignment.agent_id }));

        let Some(agent) = self.agent_for(&assignment.agent_id) else {
            Self::emit(
                tx,
                "slot.error",
                json!({ "turn": 2, "slotId": slot_id, "errorType": "server_error", "message": "unknown agent" }),
            );
            return failed_comment(slot_id, assignment.agent_id);
        };

        let prompt_text = prompts::render_turn2_prompt(slot_id.get(), &agent.id, &peers);
        let mut conversation = self.conversations.get_or_create(slot_id, &self.settings.default_system_prompt);
        conversation.push(ConversationEntry::user(prompt_text.clone()));
        self.conversations.append(slot_id, ConversationEntry::user(prompt_text));

        let req = self.build_request(agent, &conversation);
        match self.llm.generate_turn2(&req).await {
            Ok(response) => {
                let selection = response.selection;
                if selection.target_slot_id == slot_id.get() {
                    Self::emit(
                        tx,
                        "slot.error",
                        json!({ "turn": 2, "slotId": slot_id, "errorType": "server_error", "message": "self-targeted comment rejected" }),
                    );
                    return failed_comment(slot_id, agent.id.clone());
                }
                let Ok(target_slot_id) = SlotId::new(selection.target_slot_id) else {
                    Self::emit(
                        tx,
                        "slot.error",
                        json!({ "turn": 2, "slotId": slot_id, "errorType": "server_error", "message": "target slot out of range" }),
                    );
                    return failed_comment(slot_id, agent.id.clone());
                };

                self.conversations.append(
                    slot_id,
                    ConversationEntry::assistant(
                        json!({ "targetSlotId": selection.target_slot_id, "comment": selection.comment, "voice_profile": selection.voice_profile.as_str() })
                            .to_string(),
                    ),
                );
                Self::emit(
                    tx,
                    "slot.done",
                    json!({ "turn": 2, "slotId": slot_id, "agentId": agent.id, "targetSlotId": target_slot_id, "comment": selection.comment, "voiceProfile": selection.voice_profile.as_str() }),
                );

                let voice_profile = selection.voice_profile.as_str();
                let basename =
                    session_paths::turn2_basename(slot_id.get(), target_slot_id.get(), &agent.id, voice_profile);
                let audio_path =
                    tts_session.turn2_path(slot_id.get(), target_slot_id.get(), &agent.id, voice_profile);

                match self.tts.synthesize_to_file(&selection.comment, selection.voice_profile, &audio_path).await {
                    Ok(()) => {
                        let rel = relative_path(tts_session, &audio_path, &self.artifacts_dir);
                        Self::emit(tx, "slot.audio", json!({ "turn": 2, "slotId": slot_id, "audioPath": rel }));
                        self.submit_decompose(
                            tts_session.session_id,
                            2,
                            slot_id,
                            &agent.id,
                            voice_profile,
                            &basename,
                            &audio_path,
                            Some(slot_id),
                            NORMAL_TURN_N_WAVES,
                        );
                        TurnResult::Comment {
                            slot_id,
                            agent_id: agent.id.clone(),
                            comment: selection.comment,
                            voice_profile: voice_profile.to_string(),
                            target_slot_id,
                            outcome: Outcome { success: true, audio_rel_path: Some(rel) },
                        }
                    }
                    Err(err) => {
                        Self::emit(
                            tx,
                            "slot.error",
                            json!({ "turn": 2, "slotId": slot_id, "errorType": "tts_error", "message": err.to_string() }),
                        );
                        TurnResult::Comment {
                            slot_id,
                            agent_id: agent.id.clone(),
                            comment: selection.comment,
                            voice_profile: voice_profile.to_string(),
                            target_slot_id,
                            outcome: Outcome { success: true, audio_rel_path: None },
                        }
                    }
                }
            }
            Err(err) => {
                let kind = ErrorKind::classify(&err.to_string());
                Self::emit(
                    tx,
                    "slot.error",
                    json!({ "turn": 2, "slotId": slot_id, "errorType": kind, "message": err.to_string() }),
                );
                failed_comment(slot_id, agent.id.clone())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_turn3(
        self: &Arc<Self>,
        tts_session: &TtsSession,
        state: &WorkflowState,
        targets: &[SlotId],
        comments_by_target: &HashMap<SlotId, Vec<ReceivedComment>>,
        turn3_slotmeta: &mut HashMap<SlotId, SlotMeta>,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> Vec<TurnResult> {
        let tasks = targets.iter().copied().filter_map(|slot_id| {
            let assignment = state.slots.iter().find(|s| s.slot_id == slot_id)?.clone();
            let original_response = state.turn1_results.iter().find_map(|r| match r {
                TurnResult::Response { slot_id: s, text, outcome, .. } if *s == slot_id && outcome.success => {
                    Some(text.clone())
                }
                _ => None,
            })?;
            let received = comments_by_target.get(&slot_id).cloned().unwrap_or_default();

            let engine = self.clone();
            let tts_session = tts_session.clone();
            let tx = tx.clone();
            Some(tokio::spawn(async move {
                engine.run_turn3_slot(&tts_session, assignment, original_response, received, &tx).await
            }))
        });

        let results: Vec<TurnResult> = join_all(tasks).await.into_iter().filter_map(Result::ok).collect();

        for result in &results {
            if let TurnResult::Reply { slot_id, agent_id, voice_profile, outcome, .. } = result {
                if outcome.success {
                    let basename = session_paths::turn3_basename(slot_id.get(), agent_id, voice_profile);
                    turn3_slotmeta.insert(
                        *slot_id,
                        SlotMeta {
                            slot_id: *slot_id,
                            agent_id: agent_id.clone(),
                            voice_profile: voice_profile.clone(),
                            tts_basename: basename,
                        },
                    );
                }
            }
        }

        results
    }

    async fn run_turn3_slot(
        &self,
        tts_session: &TtsSession,
        assignment: SlotAssignment,
        original_response: String,
        received_comments: Vec<ReceivedComment>,
        tx: &mpsc::UnboundedSender<EngineEvent>,
    ) -> TurnResult {
        let slot_id = assignment.slot_id;
        Self::emit(tx, "slot.start", json!({ "turn": 3, "slotId": slot_id, "agentId": assignment.agent_id }));

        let Some(agent) = self.agent_for(&assignment.agent_id) else {
            Self::emit(
                tx,
                "slot.error",
                json!({ "turn": 3, "slotId": slot_id, "errorType": "server_error", "message": "unknown agent" }),
            );
            return failed_response(slot_id, assignment.agent_id);
        };

        let prompt_text =
            prompts::render_turn3_prompt(slot_id.get(), &agent.id, &original_response, &received_comments);
        let mut conversation = self.conversations.get_or_create(slot_id, &self.settings.default_system_prompt);
        conversation.push(ConversationEntry::user(prompt_text.clone()));
        self.conversations.append(slot_id, ConversationEntry::user(prompt_text));

        let req = self.build_request(agent, &conversation);
        match self.llm.generate_turn3(&req).await {
            Ok(response) => {
                self.conversations.append(slot_id, ConversationEntry::assistant(spoken_to_json(&response)));
                Self::emit(
                    tx,
                    "slot.done",
                    json!({ "turn": 3, "slotId": slot_id, "agentId": agent.id, "text": response.text, "voiceProfile": response.voice_profile.as_str() }),
                );

                let voice_profile = response.voice_profile.as_str();
                let basename = session_paths::turn3_basename(slot_id.get(), &agent.id, voice_profile);
                let audio_path = tts_session.turn3_path(slot_id.get(), &agent.id, voice_profile);

                match self.tts.synthesize_to_file(&response.text, response.voice_profile, &audio_path).await {
                    Ok(()) => {
                        let rel = relative_path(tts_session, &audio_path, &self.artifacts_dir);
                        Self::emit(tx, "slot.audio", json!({ "turn": 3, "slotId": slot_id, "audioPath": rel }));
                        self.submit_decompose(
                            tts_session.session_id,
                            3,
                            slot_id,
                            &agent.id,
                            voice_profile,
                            &basename,
                            &audio_path,
                            Some(slot_id),
                            NORMAL_TURN_N_WAVES,
                        );
                        TurnResult::Reply {
                            slot_id,
                            agent_id: agent.id.clone(),
                            text: response.text,
                            voice_profile: voice_profile.to_string(),
                            outcome: Outcome { success: true, audio_rel_path: Some(rel) },
                        }
                    }
                    Err(err) => {
                        Self::emit(
                            tx,
                            "slot.error",
                            json!({ "turn": 3, "slotId": slot_id, "errorType": "tts_error", "message": err.to_string() }),
                        );
                        TurnResult::Reply {
                            slot_id,
                            agent_id: agent.id.clone(),
                            text: response.text,
                            voice_profile: voice_profile.to_string(),
                            outcome: Outcome { success: true, audio_rel_path: None },
                        }
                    }
                }
            }
            Err(err) => {
                let kind = ErrorKind::classify(&err.to_string());
                Self::emit(
                    tx,
                    "slot.error",
                    json!({ "turn": 3, "slotId": slot_id, "errorType": kind, "message": err.to_string() }),
                );
                failed_response(slot_id, agent.id.clone())
            }
        }
    }

    async fn run_summary(&self, tts_session: &TtsSession, user_message: &str) -> Option<TurnResult> {
        if !self.settings.summary_enabled {
            return None;
        }
        let prompt_text = prompts::render_turn4_prompt(user_message);
        let req = PromptRequest {
            model: self.settings.summary_model.clone(),
            messages: vec![
                Message::system(self.settings.default_system_prompt.clone()),
                Message::user(prompt_text),
            ],
            temperature: self.settings.summary_temperature,
            max_tokens: self.settings.summary_max_tokens,
            timeout: Duration::from_secs_f64(self.settings.summary_timeout_s),
            max_retries: self.settings.retries,
        };

        match self.llm.generate_turn4(&req).await {
            Ok(response) => {
                let voice_profile = response.voice_profile.as_str();
                let basename = session_paths::summary_basename(voice_profile);
                let audio_path = tts_session.summary_path(voice_profile);

                match self.tts.synthesize_to_file(&response.text, response.voice_profile, &audio_path).await {
                    Ok(()) => {
                        let rel = relative_path(tts_session, &audio_path, &self.artifacts_dir);
                        let summary_slot = SlotId::new(1).expect("1 is a valid slot id");
                        self.submit_decompose(
                            tts_session.session_id,
                            SUMMARY_TURN_INDEX,
                            summary_slot,
                            "summary",
                            voice_profile,
                            &basename,
                            &audio_path,
                            None,
                            SUMMARY_N_WAVES,
                        );
                        self.orchestrator
                            .summary_text_ready(tts_session.session_id, response.text.clone(), voice_profile.to_string())
                            .await;
                        Some(TurnResult::Summary {
                            text: response.text,
                            voice_profile: voice_profile.to_string(),
                            outcome: Outcome { success: true, audio_rel_path: Some(rel) },
                        })
                    }
                    Err(_) => Some(TurnResult::Summary {
                        text: response.text,
                        voice_profile: voice_profile.to_string(),
                        outcome: Outcome { success: true, audio_rel_path: None },
                    }),
                }
            }
            Err(_) => None,
        }
    }

    fn build_request(&self, agent: &Agent, conversation: &Conversation) -> PromptRequest {
        PromptRequest {
            model: agent.model_identifier.clone(),
            messages: conversation_to_messages(conversation),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            timeout: Duration::from_secs(self.settings.timeout_s),
            max_retries: self.settings.retries,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_decompose(
        &self,
        session_id: Uuid,
        turn_index: i32,
        slot_id: SlotId,
        agent_id: &str,
        voice_profile: &str,
        basename: &str,
        input_path: &std::path::Path,
        target_slot_id: Option<SlotId>,
        n_waves: usize,
    ) {
        let output_dir = self.artifacts_dir.join(session_paths::waves_relative_dir(session_id, turn_index));
        let job = DecomposeJob {
            session_id,
            turn_index,
            slot_id,
            agent_id: agent_id.to_string(),
            voice_profile: voice_profile.to_string(),
            tts_basename: basename.to_string(),
            input_path: input_path.to_path_buf(),
            output_dir,
            target_slot_id,
            n_waves,
        };
        if !self.worker_pool.submit(job) {
            warn!(%session_id, slot_id = slot_id.get(), turn_index, "decomposition queue full, job dropped");
        }
    }

    fn append_turn1_manifest(
        &self,
        manifest: &mut Manifest,
        results: &[TurnResult],
        tts_session: &TtsSession,
    ) {
        for result in results {
            if let TurnResult::Response { slot_id, agent_id, text, voice_profile, outcome } = result {
                if !outcome.success {
                    continue;
                }
                manifest.turn_1.push(manifest::Turn1Entry {
                    slot_id: slot_id.get(),
                    agent_id: agent_id.clone(),
                    voice_profile: voice_profile.clone(),
                    text: text.clone(),
                    audio_path: outcome.audio_rel_path.clone().unwrap_or_default(),
                });
            }
        }
        let _ = tts_session;
    }

    fn append_turn2_manifest(&self, manifest: &mut Manifest, results: &[TurnResult], _tts_session: &TtsSession) {
        for result in results {
            if let TurnResult::Comment { slot_id, agent_id, comment, voice_profile, target_slot_id, outcome } =
                result
            {
                if !outcome.success {
                    continue;
                }
                manifest.turn_2.push(manifest::Turn2Entry {
                    slot_id: slot_id.get(),
                    agent_id: agent_id.clone(),
                    target_slot_id: target_slot_id.get(),
                    voice_profile: voice_profile.clone(),
                    comment: comment.clone(),
                    audio_path: outcome.audio_rel_path.clone().unwrap_or_default(),
                });
            }
        }
    }

    fn append_turn3_manifest(
        &self,
        manifest: &mut Manifest,
        results: &[TurnResult],
        comments_by_target: &HashMap<SlotId, Vec<ReceivedComment>>,
        _tts_session: &TtsSession,
    ) {
        for result in results {
            if let TurnResult::Reply { slot_id, agent_id, text, voice_profile, outcome } = result {
                if !outcome.success {
                    continue;
                }
                let received_from_slot_ids = comments_by_target
                    .get(slot_id)
                    .map(|comments| comments.iter().map(|c| c.from_slot_id.get()).collect())
                    .unwrap_or_default();
                manifest.turn_3.push(manifest::Turn3Entry {
                    slot_id: slot_id.get(),
                    agent_id: agent_id.clone(),
                    voice_profile: voice_profile.clone(),
                    text: text.clone(),
                    audio_path: outcome.audio_rel_path.clone().unwrap_or_default(),
                    received_from_slot_ids,
                });
            }
        }
    }

    fn append_summary_manifest(
        &self,
        manifest: &mut Manifest,
        summary: &Option<TurnResult>,
        _tts_session: &TtsSession,
    ) {
        if let Some(TurnResult::Summary { text, voice_profile, outcome }) = summary {
            if outcome.success {
                manifest.summary = Some(manifest::SummaryEntry {
                    voice_profile: voice_profile.clone(),
                    text: text.clone(),
                    audio_path: outcome.audio_rel_path.clone().unwrap_or_default(),
                });
            }
        }
    }
}

fn failed_response(slot_id: SlotId, agent_id: AgentId) -> TurnResult {
    TurnResult::Response {
        slot_id,
        agent_id,
        text: String::new(),
        voice_profile: String::new(),
        outcome: Outcome::failed(),
    }
}

fn failed_comment(slot_id: SlotId, agent_id: AgentId) -> TurnResult {
    TurnResult::Comment {
        slot_id,
        agent_id,
        comment: String::new(),
        voice_profile: String::new(),
        target_slot_id: slot_id,
        outcome: Outcome::failed(),
    }
}

fn relative_path(tts_session: &TtsSession, absolute: &std::path::Path, artifacts_dir: &std::path::Path) -> String {
    tts_session.relative_to_artifacts(absolute, artifacts_dir).unwrap_or_default()
}

fn spoken_to_json(response: &resonance_llm::SpokenResponse) -> String {
    json!({ "text": response.text, "voice_profile": response.voice_profile.as_str() }).to_string()
}

fn conversation_to_messages(conversation: &Conversation) -> Vec<Message> {
    conversation
        .entries()
        .iter()
        .map(|entry| {
            let content = entry.text.clone();
            match entry.role {
                Role::System => Message::system(content),
                Role::User => Message::user(content),
                Role::Assistant => Message::assistant(content),
            }
        })
        .collect()
}

fn build_dialogues(
    comments_by_target: &HashMap<SlotId, Vec<ReceivedComment>>,
    turn2_slotmeta: &HashMap<SlotId, SlotMeta>,
    turn3_slotmeta: &HashMap<SlotId, SlotMeta>,
) -> Vec<Dialogue> {
    let mut dialogues = Vec::new();
    for (target, comments) in comments_by_target {
        let commenters: Vec<SlotMeta> =
            comments.iter().filter_map(|c| turn2_slotmeta.get(&c.from_slot_id).cloned()).collect();
        if commenters.is_empty() {
            continue;
        }
        let Some(respondent) = turn3_slotmeta.get(target).cloned() else { continue };
        dialogues.push(Dialogue::new(*target, commenters, respondent));
    }
    dialogues.sort_by_key(|d| d.target_slot_id);
    dialogues
}
