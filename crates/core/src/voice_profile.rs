use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The six named voice profiles an agent's synthesized speech may use.
///
/// Fixed enumerated set, grounded in the original's `tts/profiles.py`. An
/// agent's structured LLM output names one of these by string; unknown or
/// missing values fall back to [`VoiceProfile::default_fallback`] rather than
/// failing the turn (the distilled spec treats `voice_profile` as an opaque
/// string — this fixes the set so it round-trips through validation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceProfile {
    FriendlyCasual,
    WarmProfessional,
    EnergeticUpbeat,
    CalmSoothing,
    ConfidentCharming,
    PlayfulExpressive,
}

impl VoiceProfile {
    pub const ALL: [VoiceProfile; 6] = [
        VoiceProfile::FriendlyCasual,
        VoiceProfile::WarmProfessional,
        VoiceProfile::EnergeticUpbeat,
        VoiceProfile::CalmSoothing,
        VoiceProfile::ConfidentCharming,
        VoiceProfile::PlayfulExpressive,
    ];

    /// Used whenever an agent's structured output omits or misnames a
    /// profile, so the turn never fails over a cosmetic field.
    pub fn default_fallback() -> Self {
        VoiceProfile::WarmProfessional
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceProfile::FriendlyCasual => "friendly_casual",
            VoiceProfile::WarmProfessional => "warm_professional",
            VoiceProfile::EnergeticUpbeat => "energetic_upbeat",
            VoiceProfile::CalmSoothing => "calm_soothing",
            VoiceProfile::ConfidentCharming => "confident_charming",
            VoiceProfile::PlayfulExpressive => "playful_expressive",
        }
    }
}

impl fmt::Display for VoiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "friendly_casual" => Ok(VoiceProfile::FriendlyCasual),
            "warm_professional" => Ok(VoiceProfile::WarmProfessional),
            "energetic_upbeat" => Ok(VoiceProfile::EnergeticUpbeat),
            "calm_soothing" => Ok(VoiceProfile::CalmSoothing),
            "confident_charming" => Ok(VoiceProfile::ConfidentCharming),
            "playful_expressive" => Ok(VoiceProfile::PlayfulExpressive),
            _ => Err(()),
        }
    }
}

/// Parses a profile string from LLM output, substituting the fallback
/// profile (rather than erroring) on anything unrecognized.
pub fn parse_voice_profile_lenient(raw: &str) -> VoiceProfile {
    VoiceProfile::from_str(raw).unwrap_or_else(|_| VoiceProfile::default_fallback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for profile in VoiceProfile::ALL {
            let s = profile.to_string();
            assert_eq!(VoiceProfile::from_str(&s).unwrap(), profile);
        }
    }

    #[test]
    fn unknown_profile_falls_back() {
        assert_eq!(parse_voice_profile_lenient("not_a_real_profile"), VoiceProfile::default_fallback());
    }
}
