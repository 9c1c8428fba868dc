use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookkeeping for one speech-to-text request: the uploaded audio, the
/// resulting transcript in both machine and plain-text form, and a small
/// metadata blob recording which vendor/model produced it.
///
/// Grounded on the original `stt/sessions.py` session layout:
/// `stt/sessions/<id>/input.<ext>`, `transcript.json`, `transcript.txt`,
/// `metadata.json`.
#[derive(Debug, Clone)]
pub struct SttSession {
    pub session_id: Uuid,
    pub root_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttMetadata {
    pub session_id: String,
    pub created_at: String,
    pub model: String,
    pub duration_s: Option<f32>,
}

impl SttSession {
    pub fn new(artifacts_dir: &Path, session_id: Uuid) -> Self {
        Self {
            session_id,
            root_dir: artifacts_dir.join("stt").join("sessions").join(session_id.to_string()),
            created_at: Utc::now(),
        }
    }

    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await
    }

    pub fn input_path(&self, extension: &str) -> PathBuf {
        self.root_dir.join(format!("input.{extension}"))
    }

    pub fn transcript_json_path(&self) -> PathBuf {
        self.root_dir.join("transcript.json")
    }

    pub fn transcript_txt_path(&self) -> PathBuf {
        self.root_dir.join("transcript.txt")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root_dir.join("metadata.json")
    }

    pub async fn write_transcript(&self, text: &str, model: &str) -> std::io::Result<()> {
        self.ensure_layout().await?;
        tokio::fs::write(self.transcript_txt_path(), text).await?;
        let json = serde_json::json!({ "text": text });
        tokio::fs::write(self.transcript_json_path(), serde_json::to_vec_pretty(&json).unwrap_or_default())
            .await?;
        let metadata = SttMetadata {
            session_id: self.session_id.to_string(),
            created_at: self.created_at.to_rfc3339(),
            model: model.to_string(),
            duration_s: None,
        };
        tokio::fs::write(
            self.metadata_path(),
            serde_json::to_vec_pretty(&metadata).unwrap_or_default(),
        )
        .await
    }
}
