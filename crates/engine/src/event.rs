use serde_json::Value;

/// One SSE payload for a broadcast request. The server wraps these into
/// `axum::response::sse::Event` with `.event(name).json_data(data)` — kept
/// as a plain struct here so this crate never depends on `axum`, matching
/// the same transport-agnostic seam `resonance_events::ControllerSink` uses.
#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub name: &'static str,
    pub data: Value,
}

impl EngineEvent {
    pub fn new(name: &'static str, data: Value) -> Self {
        Self { name, data }
    }
}
