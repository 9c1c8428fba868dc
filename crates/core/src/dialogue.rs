use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{AgentId, SlotId};

/// Metadata the events orchestrator needs to reconstruct a ready-event
/// payload for one slot's wave output, without reparsing filenames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMeta {
    pub slot_id: SlotId,
    pub agent_id: AgentId,
    pub voice_profile: String,
    pub tts_basename: String,
}

impl SlotMeta {
    /// Derive absolute and relative paths for wave1 and wave2 files.
    ///
    /// Mirrors exactly what [`resonance_audio`]'s decomposition stage
    /// writes: `waves/sessions/<sid>/turn_<N>/<basename>_v3_wave<k>.wav`
    /// (or `.../summary/...` when `turn_index` is the summary sentinel).
    pub fn derive_wave_paths(
        &self,
        artifacts_root: &Path,
        session_id: uuid::Uuid,
        turn_index: i32,
    ) -> WavePaths {
        let turn_segment = if turn_index < 0 {
            "summary".to_string()
        } else {
            format!("turn_{turn_index}")
        };
        let base_rel = format!(
            "waves/sessions/{session_id}/{turn_segment}/{}_v3",
            self.tts_basename
        );

        let wave1_rel = format!("{base_rel}_wave1.wav");
        let wave2_rel = format!("{base_rel}_wave2.wav");
        let wave1_abs = artifacts_root.join(&wave1_rel);
        let wave2_abs = artifacts_root.join(&wave2_rel);

        WavePaths { wave1_abs, wave1_rel, wave2_abs, wave2_rel }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePaths {
    pub wave1_abs: PathBuf,
    pub wave1_rel: String,
    pub wave2_abs: PathBuf,
    pub wave2_rel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayOrderRole {
    Commenter,
    Respondent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayOrderItem {
    pub role: PlayOrderRole,
    pub slot_id: SlotId,
}

/// One respondent (Turn 3) and its commenters (Turn 2), all targeting the
/// same slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialogue {
    pub dialogue_id: String,
    pub target_slot_id: SlotId,
    pub commenters: Vec<SlotMeta>,
    pub respondent: SlotMeta,
}

impl Dialogue {
    pub fn new(target_slot_id: SlotId, commenters: Vec<SlotMeta>, respondent: SlotMeta) -> Self {
        Self {
            dialogue_id: format!("turn23-slot{target_slot_id}"),
            target_slot_id,
            commenters,
            respondent,
        }
    }

    /// All commenters first (in registration order), then the respondent.
    pub fn play_order(&self) -> Vec<PlayOrderItem> {
        let mut order: Vec<PlayOrderItem> = self
            .commenters
            .iter()
            .map(|c| PlayOrderItem { role: PlayOrderRole::Commenter, slot_id: c.slot_id })
            .collect();
        order.push(PlayOrderItem { role: PlayOrderRole::Respondent, slot_id: self.respondent.slot_id });
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(slot: u8) -> SlotMeta {
        SlotMeta {
            slot_id: SlotId::new(slot).unwrap(),
            agent_id: "lumen".into(),
            voice_profile: "friendly_casual".into(),
            tts_basename: format!("slot-{slot}_lumen_friendly_casual"),
        }
    }

    #[test]
    fn wave_target_slot_ids_match_physical_routing_contract() {
        let m = meta(3);
        // wave1TargetSlotId = slotId, wave2TargetSlotId = (slotId mod 6) + 1
        assert_eq!(m.slot_id.get(), 3);
        assert_eq!(m.slot_id.next_wrapping().get(), 4);
    }

    #[test]
    fn play_order_lists_commenters_then_respondent() {
        let dialogue = Dialogue::new(SlotId::new(2).unwrap(), vec![meta(1), meta(3), meta(5)], meta(2));
        let order = dialogue.play_order();
        assert_eq!(order.len(), 4);
        assert!(order[..3].iter().all(|i| i.role == PlayOrderRole::Commenter));
        assert_eq!(order[3].role, PlayOrderRole::Respondent);
        assert_eq!(order[3].slot_id.get(), 2);
        assert_eq!(dialogue.dialogue_id, "turn23-slot2");
    }
}
