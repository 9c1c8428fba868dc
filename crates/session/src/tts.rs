use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::paths;

/// Owns the per-request directory tree under `tts/sessions/<id>/` and hands
/// out the basenames/paths each turn writes its synthesized audio to.
///
/// Grounded on the original's `TTSSession` dataclass: one instance per
/// in-flight request, created at Turn 1 and reused through Turn 4.
#[derive(Debug, Clone)]
pub struct TtsSession {
    pub session_id: Uuid,
    pub root_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl TtsSession {
    pub fn new(artifacts_dir: &Path, session_id: Uuid) -> Self {
        Self {
            session_id,
            root_dir: artifacts_dir.join("tts").join("sessions").join(session_id.to_string()),
            created_at: Utc::now(),
        }
    }

    /// Creates the turn_1/turn_2/turn_3/summary subdirectories. Idempotent.
    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        for segment in ["turn_1", "turn_2", "turn_3", "summary"] {
            tokio::fs::create_dir_all(self.root_dir.join(segment)).await?;
        }
        Ok(())
    }

    fn dir_for_turn(&self, turn_index: i32) -> PathBuf {
        let segment = if turn_index < 0 { "summary".to_string() } else { format!("turn_{turn_index}") };
        self.root_dir.join(segment)
    }

    pub fn turn1_path(&self, slot_id: u8, agent_id: &str, voice_profile: &str) -> PathBuf {
        let base = paths::turn1_basename(slot_id, agent_id, voice_profile);
        self.dir_for_turn(1).join(format!("{base}.wav"))
    }

    pub fn turn2_path(&self, slot_id: u8, target_slot_id: u8, agent_id: &str, voice_profile: &str) -> PathBuf {
        let base = paths::turn2_basename(slot_id, target_slot_id, agent_id, voice_profile);
        self.dir_for_turn(2).join(format!("{base}.wav"))
    }

    pub fn turn3_path(&self, slot_id: u8, agent_id: &str, voice_profile: &str) -> PathBuf {
        let base = paths::turn3_basename(slot_id, agent_id, voice_profile);
        self.dir_for_turn(3).join(format!("{base}.wav"))
    }

    pub fn summary_path(&self, voice_profile: &str) -> PathBuf {
        let base = paths::summary_basename(voice_profile);
        self.dir_for_turn(-1).join(format!("{base}.wav"))
    }

    /// Path relative to `artifacts_dir`, suitable for the public `/v1/audio`
    /// static route and for manifest entries.
    pub fn relative_to_artifacts(&self, absolute: &Path, artifacts_dir: &Path) -> Option<String> {
        absolute
            .strip_prefix(artifacts_dir)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_paths_nest_under_root() {
        let artifacts = PathBuf::from("/tmp/artifacts");
        let sid = Uuid::nil();
        let session = TtsSession::new(&artifacts, sid);
        let p = session.turn1_path(2, "tidal", "warm_deep");
        assert_eq!(
            p,
            artifacts.join("tts/sessions").join(sid.to_string()).join("turn_1/slot-2_tidal_warm_deep.wav")
        );
    }
}
