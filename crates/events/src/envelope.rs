use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// The common envelope every controller-channel message is wrapped in:
/// `{type, sessionId, seq, ts, payload}`.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub seq: u64,
    pub ts: String,
    pub payload: Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, session_id: Uuid, seq: u64, payload: Value) -> Self {
        Self { event_type: event_type.into(), session_id, seq, ts: Utc::now().to_rfc3339(), payload }
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
