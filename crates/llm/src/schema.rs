use resonance_core::{parse_voice_profile_lenient, VoiceProfile};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::LlmError;

/// Raw structured response for Turns 1, 3, and 4 (the "speak something in a
/// chosen voice" shape).
#[derive(Debug, Clone)]
pub struct SpokenResponse {
    pub text: String,
    pub voice_profile: VoiceProfile,
}

pub type Turn1Response = SpokenResponse;
pub type Turn3Response = SpokenResponse;
pub type Turn4Response = SpokenResponse;

#[derive(Debug, Clone)]
pub struct Turn2Response {
    pub selection: CommentSelection,
}

#[derive(Debug, Clone)]
pub struct CommentSelection {
    pub target_slot_id: u8,
    pub comment: String,
    pub voice_profile: VoiceProfile,
}

#[derive(Debug, Clone)]
pub struct SentimentResponse {
    pub sentiment: String,
    pub justification: String,
}

#[derive(Deserialize)]
struct RawSpoken {
    text: String,
    #[serde(default)]
    voice_profile: Option<String>,
}

#[derive(Deserialize)]
struct RawComment {
    #[serde(rename = "targetSlotId")]
    target_slot_id: u8,
    comment: String,
    #[serde(default)]
    voice_profile: Option<String>,
}

#[derive(Deserialize)]
struct RawSentiment {
    sentiment: String,
    justification: String,
}

fn resolve_profile(raw: Option<String>) -> VoiceProfile {
    raw.map(|s| parse_voice_profile_lenient(&s)).unwrap_or_else(VoiceProfile::default_fallback)
}

pub(crate) fn spoken_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string" },
            "voice_profile": {
                "type": "string",
                "enum": VoiceProfile::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            },
        },
        "required": ["text", "voice_profile"],
    })
}

pub(crate) fn comment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "targetSlotId": { "type": "integer", "minimum": 1, "maximum": 6 },
            "comment": { "type": "string" },
            "voice_profile": {
                "type": "string",
                "enum": VoiceProfile::ALL.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            },
        },
        "required": ["targetSlotId", "comment", "voice_profile"],
    })
}

pub(crate) fn sentiment_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sentiment": { "type": "string" },
            "justification": { "type": "string" },
        },
        "required": ["sentiment", "justification"],
    })
}

pub(crate) fn parse_spoken(value: Value) -> Result<SpokenResponse, LlmError> {
    let raw: RawSpoken = serde_json::from_value(value)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    Ok(SpokenResponse { text: raw.text, voice_profile: resolve_profile(raw.voice_profile) })
}

pub(crate) fn parse_comment(value: Value) -> Result<Turn2Response, LlmError> {
    let raw: RawComment = serde_json::from_value(value)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    if !(1..=6).contains(&raw.target_slot_id) {
        return Err(LlmError::InvalidResponse(format!(
            "targetSlotId {} out of range 1..=6",
            raw.target_slot_id
        )));
    }
    Ok(Turn2Response {
        selection: CommentSelection {
            target_slot_id: raw.target_slot_id,
            comment: raw.comment,
            voice_profile: resolve_profile(raw.voice_profile),
        },
    })
}

pub(crate) fn parse_sentiment(value: Value) -> Result<SentimentResponse, LlmError> {
    let raw: RawSentiment = serde_json::from_value(value)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    Ok(SentimentResponse { sentiment: raw.sentiment, justification: raw.justification })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_voice_profile_in_payload_falls_back() {
        let value = json!({ "text": "hello", "voice_profile": "not_a_profile" });
        let parsed = parse_spoken(value).unwrap();
        assert_eq!(parsed.voice_profile, VoiceProfile::default_fallback());
    }

    #[test]
    fn comment_rejects_out_of_range_target() {
        let value = json!({ "targetSlotId": 9, "comment": "hi", "voice_profile": "calm_soothing" });
        assert!(parse_comment(value).is_err());
    }
}
