use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use resonance_core::{AgentId, Dialogue, SlotId, SlotMeta};
use serde::Serialize;
use uuid::Uuid;

/// Everything the controller needs to address one slot's physical wave
/// output, reconstructed from [`SlotMeta`] — never by reparsing a filename.
#[derive(Debug, Clone, Serialize)]
pub struct SlotWaveInfo {
    #[serde(rename = "slotId")]
    pub slot_id: SlotId,
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
    #[serde(rename = "voiceProfile")]
    pub voice_profile: String,
    #[serde(rename = "wave1TargetSlotId")]
    pub wave1_target_slot_id: SlotId,
    #[serde(rename = "wave1PathAbs")]
    pub wave1_path_abs: String,
    #[serde(rename = "wave1PathRel")]
    pub wave1_path_rel: String,
    #[serde(rename = "wave2TargetSlotId")]
    pub wave2_target_slot_id: SlotId,
    #[serde(rename = "wave2PathAbs")]
    pub wave2_path_abs: String,
    #[serde(rename = "wave2PathRel")]
    pub wave2_path_rel: String,
}

impl SlotWaveInfo {
    pub fn derive(meta: &SlotMeta, artifacts_root: &Path, session_id: Uuid, turn_index: i32) -> Self {
        let paths = meta.derive_wave_paths(artifacts_root, session_id, turn_index);
        Self {
            slot_id: meta.slot_id,
            agent_id: meta.agent_id.clone(),
            voice_profile: meta.voice_profile.clone(),
            wave1_target_slot_id: meta.slot_id,
            wave1_path_abs: paths.wave1_abs.to_string_lossy().into_owned(),
            wave1_path_rel: paths.wave1_rel,
            wave2_target_slot_id: meta.slot_id.next_wrapping(),
            wave2_path_abs: paths.wave2_abs.to_string_lossy().into_owned(),
            wave2_path_rel: paths.wave2_rel,
        }
    }
}

/// One physical slot's wave output for the Turn-4 summary. Unlike
/// [`SlotWaveInfo`], the summary decomposition produces one wave file per
/// physical slot directly (`n_waves = 6`) rather than a wave1/wave2 pair
/// per logical slot, so it gets its own, flatter shape.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryWaveInfo {
    #[serde(rename = "slotId")]
    pub slot_id: SlotId,
    #[serde(rename = "wavePathAbs")]
    pub wave_path_abs: String,
    #[serde(rename = "wavePathRel")]
    pub wave_path_rel: String,
}

/// Per-session readiness bookkeeping, owned exclusively by the
/// orchestrator's consumer task (Design Notes: "session events state ...
/// only the orchestrator's consumer task mutates it").
#[derive(Debug, Default)]
pub struct SessionEventsState {
    pub turn1_expected: HashSet<SlotId>,
    pub turn1_ready: BTreeMap<SlotId, SlotMeta>,
    pub turn2_expected: HashSet<SlotId>,
    pub turn2_ready: BTreeMap<SlotId, SlotMeta>,
    pub turn3_expected: HashSet<SlotId>,
    pub turn3_ready: BTreeMap<SlotId, SlotMeta>,
    pub dialogues: Vec<Dialogue>,
    pub workflow_complete: bool,
    pub batch_emitted: bool,
    pub seq_counter: u64,
    /// Text/voice_profile from the engine, stored until the matching
    /// summary decomposition result arrives (or vice versa).
    pub pending_summary_text: Option<(String, String)>,
    pub summary_waves: Option<Vec<SummaryWaveInfo>>,
    pub summary_emitted: bool,
}

impl SessionEventsState {
    pub fn new(turn1_expected: Vec<SlotId>) -> Self {
        Self { turn1_expected: turn1_expected.into_iter().collect(), ..Default::default() }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq_counter += 1;
        self.seq_counter
    }

    /// `workflow_complete ∧ turn1_expected⊆turn1_ready ∧ turn2_expected⊆turn2_ready
    /// ∧ turn3_expected⊆turn3_ready`.
    pub fn is_all_ready(&self) -> bool {
        self.workflow_complete
            && self.turn1_expected.iter().all(|s| self.turn1_ready.contains_key(s))
            && self.turn2_expected.iter().all(|s| self.turn2_ready.contains_key(s))
            && self.turn3_expected.iter().all(|s| self.turn3_ready.contains_key(s))
    }

    pub fn missing_turn1_slots(&self) -> Vec<SlotId> {
        let mut missing: Vec<SlotId> =
            self.turn1_expected.iter().filter(|s| !self.turn1_ready.contains_key(s)).copied().collect();
        missing.sort();
        missing
    }

    pub fn dialogue_is_ready(&self, dialogue: &Dialogue) -> bool {
        dialogue.commenters.iter().all(|c| self.turn2_ready.contains_key(&c.slot_id))
            && self.turn3_ready.contains_key(&dialogue.respondent.slot_id)
    }
}

impl SummaryWaveInfo {
    pub fn from_path(slot_id: SlotId, abs: &Path, artifacts_root: &Path) -> Self {
        let rel = abs.strip_prefix(artifacts_root).unwrap_or(abs).to_string_lossy().replace('\\', "/");
        Self { slot_id, wave_path_abs: abs.to_string_lossy().into_owned(), wave_path_rel: rel }
    }
}
