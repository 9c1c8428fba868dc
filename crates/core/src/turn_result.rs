use serde::{Deserialize, Serialize};

use crate::{AgentId, SlotId};

/// Fields common to every slot outcome, regardless of which turn produced it.
///
/// Invariant: if `success` is true, `audio_rel_path` is set and the file
/// exists; if false, `text`/`voice_profile` are empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub audio_rel_path: Option<String>,
}

impl Outcome {
    pub fn ok(audio_rel_path: String) -> Self {
        Self { success: true, audio_rel_path: Some(audio_rel_path) }
    }

    pub fn failed() -> Self {
        Self { success: false, audio_rel_path: None }
    }
}

/// One slot's result for a given turn. Modeled as a tagged variant per turn
/// shape rather than one struct with optional fields for every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnResult {
    /// Turn 1 (Reflect).
    Response {
        slot_id: SlotId,
        agent_id: AgentId,
        text: String,
        voice_profile: String,
        outcome: Outcome,
    },
    /// Turn 2 (Comment).
    Comment {
        slot_id: SlotId,
        agent_id: AgentId,
        comment: String,
        voice_profile: String,
        target_slot_id: SlotId,
        outcome: Outcome,
    },
    /// Turn 3 (Reply).
    Reply {
        slot_id: SlotId,
        agent_id: AgentId,
        text: String,
        voice_profile: String,
        outcome: Outcome,
    },
    /// Turn 4 (Summary) — a single result, not per-slot.
    Summary {
        text: String,
        voice_profile: String,
        outcome: Outcome,
    },
}

impl TurnResult {
    pub fn outcome(&self) -> &Outcome {
        match self {
            TurnResult::Response { outcome, .. }
            | TurnResult::Comment { outcome, .. }
            | TurnResult::Reply { outcome, .. }
            | TurnResult::Summary { outcome, .. } => outcome,
        }
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        match self {
            TurnResult::Response { slot_id, .. }
            | TurnResult::Comment { slot_id, .. }
            | TurnResult::Reply { slot_id, .. } => Some(*slot_id),
            TurnResult::Summary { .. } => None,
        }
    }
}
