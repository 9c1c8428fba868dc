use resonance_core::{Dialogue, SlotId};
use uuid::Uuid;

use crate::sink::ControllerSink;

pub enum Command {
    SessionStart { session_id: Uuid, turn1_expected: Vec<SlotId> },
    Turn1Settled { session_id: Uuid, turn2_expected: Vec<SlotId> },
    Turn3Settled { session_id: Uuid, turn3_expected: Vec<SlotId>, dialogues: Vec<Dialogue> },
    WorkflowTimeout { session_id: Uuid },
    UserSentiment { session_id: Uuid, sentiment: String, justification: String },
    /// The engine's side of the final-summary rendezvous: text + voice
    /// profile are known as soon as Turn 4's LLM/TTS call succeeds, ahead of
    /// the async decomposition result that supplies the wave paths.
    SummaryTextReady { session_id: Uuid, text: String, voice_profile: String },
    AttachController { sink: Box<dyn ControllerSink> },
}
