//! Pure path-derivation functions for the TTS/waves filesystem layout.
//!
//! Bit-exact with §3/§4.1 of the spec:
//! ```text
//! tts/sessions/<sid>/turn_1/slot-<N>_<agent>_<voice>.wav
//! tts/sessions/<sid>/turn_2/slot-<N>_comment_to_slot-<T>_<agent>_<voice>.wav
//! tts/sessions/<sid>/turn_3/slot-<N>_reply_<agent>_<voice>.wav
//! tts/sessions/<sid>/summary/summary_<voice>.wav
//! waves/sessions/<sid>/turn_<N>/<basename>_v3_wave<k>.wav
//! ```

use uuid::Uuid;

pub fn turn1_basename(slot_id: u8, agent_id: &str, voice_profile: &str) -> String {
    format!("slot-{slot_id}_{agent_id}_{voice_profile}")
}

pub fn turn2_basename(slot_id: u8, target_slot_id: u8, agent_id: &str, voice_profile: &str) -> String {
    format!("slot-{slot_id}_comment_to_slot-{target_slot_id}_{agent_id}_{voice_profile}")
}

pub fn turn3_basename(slot_id: u8, agent_id: &str, voice_profile: &str) -> String {
    format!("slot-{slot_id}_reply_{agent_id}_{voice_profile}")
}

pub fn summary_basename(voice_profile: &str) -> String {
    format!("summary_{voice_profile}")
}

/// Relative path (under the artifacts root) for turn `turn_index`'s audio
/// file, given its basename.
pub fn tts_relative_path(session_id: Uuid, turn_index: i32, basename: &str) -> String {
    let segment = if turn_index < 0 { "summary".to_string() } else { format!("turn_{turn_index}") };
    format!("tts/sessions/{session_id}/{segment}/{basename}.wav")
}

/// Directory (relative to the artifacts root) that wave output files for
/// this turn are written into.
pub fn waves_relative_dir(session_id: Uuid, turn_index: i32) -> String {
    let segment = if turn_index < 0 { "summary".to_string() } else { format!("turn_{turn_index}") };
    format!("waves/sessions/{session_id}/{segment}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn1_path_matches_layout_contract() {
        let sid = Uuid::nil();
        let base = turn1_basename(3, "lumen", "friendly_casual");
        assert_eq!(base, "slot-3_lumen_friendly_casual");
        let rel = tts_relative_path(sid, 1, &base);
        assert_eq!(
            rel,
            format!("tts/sessions/{sid}/turn_1/slot-3_lumen_friendly_casual.wav")
        );
    }

    #[test]
    fn turn2_path_encodes_target_slot() {
        let base = turn2_basename(1, 4, "tidal", "calm_soothing");
        assert_eq!(base, "slot-1_comment_to_slot-4_tidal_calm_soothing");
    }

    #[test]
    fn summary_uses_sentinel_segment() {
        let sid = Uuid::nil();
        let rel = tts_relative_path(sid, -1, &summary_basename("ember"));
        assert_eq!(rel, format!("tts/sessions/{sid}/summary/summary_ember.wav"));
        assert_eq!(waves_relative_dir(sid, -1), format!("waves/sessions/{sid}/summary"));
    }
}
