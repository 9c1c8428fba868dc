use serde::{Deserialize, Serialize};

use crate::{AgentId, SlotId};

/// A comment routed from Turn 2 to Turn 3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedComment {
    pub from_slot_id: SlotId,
    pub from_agent_id: AgentId,
    pub comment: String,
}
