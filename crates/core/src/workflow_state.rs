use std::collections::HashMap;

use crate::{ReceivedComment, SlotAssignment, SlotId, TurnResult};

/// Owned exclusively by the engine task running one broadcast request. No
/// other task mutates it.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub session_id: uuid::Uuid,
    pub slots: Vec<SlotAssignment>,
    pub user_message: String,
    pub turn1_results: Vec<TurnResult>,
    pub turn2_results: Vec<TurnResult>,
    pub turn3_results: Vec<TurnResult>,
    pub comments_by_target: HashMap<SlotId, Vec<ReceivedComment>>,
    pub summary_result: Option<TurnResult>,
}

impl WorkflowState {
    pub fn new(session_id: uuid::Uuid, slots: Vec<SlotAssignment>, user_message: String) -> Self {
        Self {
            session_id,
            slots,
            user_message,
            turn1_results: Vec::new(),
            turn2_results: Vec::new(),
            turn3_results: Vec::new(),
            comments_by_target: HashMap::new(),
            summary_result: None,
        }
    }

    /// Slot IDs whose Turn 1 call produced a successful outcome.
    pub fn successful_turn1_slots(&self) -> Vec<SlotId> {
        self.turn1_results
            .iter()
            .filter(|r| r.outcome().success)
            .filter_map(|r| r.slot_id())
            .collect()
    }
}
