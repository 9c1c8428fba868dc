use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{AgentId, SlotId};

/// `turn_index` values carried by a [`DecomposeJob`]; `-1` denotes the
/// summary.
pub const SUMMARY_TURN_INDEX: i32 = -1;

/// Immutable once submitted to the worker pool. Carries enough metadata for
/// the events orchestrator to reconstruct event payloads without having to
/// parse the TTS filename (Turn 2/3 names include extra tokens).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeJob {
    pub session_id: uuid::Uuid,
    pub turn_index: i32,
    pub slot_id: SlotId,
    pub agent_id: AgentId,
    pub voice_profile: String,
    pub tts_basename: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub target_slot_id: Option<SlotId>,
    pub n_waves: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub rmse: f64,
    pub nrmse: f64,
    pub snr_db: f64,
    pub env_corr: f64,
}

/// Result delivered by the worker pool to the events orchestrator over a
/// channel (never via callback — see Design Notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposeResult {
    pub job: DecomposeJob,
    pub success: bool,
    pub wave_paths: Vec<PathBuf>,
    pub quality_metrics: Option<QualityMetrics>,
    pub duration_ms: f64,
    pub error: Option<String>,
}

impl DecomposeResult {
    pub fn failure(job: DecomposeJob, error: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            job,
            success: false,
            wave_paths: Vec::new(),
            quality_metrics: None,
            duration_ms,
            error: Some(error.into()),
        }
    }
}
