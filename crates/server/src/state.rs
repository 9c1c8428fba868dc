use std::path::PathBuf;
use std::sync::Arc;

use resonance_audio::SttClient;
use resonance_config::Settings;
use resonance_core::Agent;
use resonance_engine::Engine;
use resonance_events::Orchestrator;

use crate::conversation::ConversationStore;

/// Collaborators the HTTP/WebSocket layer needs, constructed once at process
/// start in `main.rs` and cloned cheaply into every request (Design Notes:
/// "global singletons become explicit dependencies").
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub orchestrator: Orchestrator,
    pub conversations: Arc<ConversationStore>,
    pub stt: Arc<dyn SttClient>,
    pub settings: Arc<Settings>,
    pub agents: Arc<[Agent]>,
    pub artifacts_dir: PathBuf,
}
