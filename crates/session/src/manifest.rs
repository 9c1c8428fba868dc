use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn1Entry {
    pub slot_id: u8,
    pub agent_id: String,
    pub voice_profile: String,
    pub text: String,
    pub audio_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn2Entry {
    pub slot_id: u8,
    pub agent_id: String,
    pub target_slot_id: u8,
    pub voice_profile: String,
    pub comment: String,
    pub audio_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn3Entry {
    pub slot_id: u8,
    pub agent_id: String,
    pub voice_profile: String,
    pub text: String,
    pub audio_path: String,
    pub received_from_slot_ids: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub voice_profile: String,
    pub text: String,
    pub audio_path: String,
}

/// Append-in-memory structure flushed to `session.json` exactly once, after
/// Turn 4 completes (or Turn 3, when summary is disabled).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: String,
    pub created_at: String,
    pub turn_1: Vec<Turn1Entry>,
    pub turn_2: Vec<Turn2Entry>,
    pub turn_3: Vec<Turn3Entry>,
    pub summary: Option<SummaryEntry>,
}

impl Manifest {
    pub fn new(session_id: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), created_at: created_at.into(), ..Default::default() }
    }

    /// Write the manifest to disk. Failure is the caller's concern to log —
    /// it must never fail the request (§4.1).
    pub async fn write(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self).unwrap_or_default();
        tokio::fs::write(path, json).await
    }
}

pub fn manifest_path(output_dir: &std::path::Path) -> PathBuf {
    output_dir.join("session.json")
}
