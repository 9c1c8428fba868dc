//! Prompt rendering for the four turns, grounded in the original's
//! Jinja2-templated `prompts/__init__.py`. Rendered here as plain `format!`
//! strings since the content is fixed and small — no templating crate earns
//! its keep for four call sites.

use resonance_core::ReceivedComment;

const VOICE_PROFILES_TABLE: &str = "\
| Profile | Character | Use For |
|---------|-----------|---------|
| friendly_casual | Young female, American, warm | Casual greetings, friendly chat |
| warm_professional | Male, American, helpful | Advice, thoughtful answers |
| energetic_upbeat | Young female, energetic | Excited responses, fun |
| calm_soothing | Female, calm, gentle | Reassurance, patience |
| confident_charming | Male, British, witty | Clever remarks, charm |
| playful_expressive | Female, dynamic range | Playful banter, emotions |";

pub struct PeerResponse {
    pub slot_id: u8,
    pub agent_id: String,
    pub text: String,
}

pub fn render_turn1_prompt(user_message: &str) -> String {
    format!(
        "A visitor has spoken into the installation. Respond to them as one \
         of six resonant voices.\n\n\
         Visitor's message: {user_message}\n\n\
         Choose the voice_profile that best matches the emotional tone of \
         your response.\n\n{VOICE_PROFILES_TABLE}"
    )
}

pub fn render_turn2_prompt(slot_id: u8, agent_id: &str, peer_responses: &[PeerResponse]) -> String {
    let mut listing = String::new();
    for peer in peer_responses {
        listing.push_str(&format!("- slot {} ({}): {}\n", peer.slot_id, peer.agent_id, peer.text));
    }
    format!(
        "You are slot {slot_id} ({agent_id}). Here are the other voices' \
         responses to the same visitor message:\n\n{listing}\n\
         Pick exactly one of them (by targetSlotId) and offer a short \
         comment reacting to it. targetSlotId must not be your own slot \
         ({slot_id}).\n\n{VOICE_PROFILES_TABLE}"
    )
}

pub fn render_turn3_prompt(
    slot_id: u8,
    agent_id: &str,
    original_response: &str,
    received_comments: &[ReceivedComment],
) -> String {
    let mut listing = String::new();
    for comment in received_comments {
        listing.push_str(&format!(
            "- slot {} ({}): {}\n",
            comment.from_slot_id, comment.from_agent_id, comment.comment
        ));
    }
    format!(
        "You are slot {slot_id} ({agent_id}). Your earlier response was:\n\n\
         \"{original_response}\"\n\n\
         Other voices commented on it:\n\n{listing}\n\
         Reply briefly, acknowledging the comments in your own voice.\n\n{VOICE_PROFILES_TABLE}"
    )
}

pub fn render_turn4_prompt(user_message: &str) -> String {
    format!(
        "Summarize the installation's collective response to the visitor's \
         message in a single reflective passage, as if all six voices were \
         speaking as one.\n\n\
         Visitor's message: {user_message}\n\n{VOICE_PROFILES_TABLE}"
    )
}

pub fn render_sentiment_prompt(user_message: &str) -> String {
    format!(
        "Classify the sentiment of this visitor message in one or two words \
         (e.g. \"curious\", \"anxious\", \"joyful\") and give a brief \
         justification.\n\nMessage: {user_message}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn2_prompt_lists_every_peer() {
        let peers = vec![
            PeerResponse { slot_id: 2, agent_id: "tidal".into(), text: "hello".into() },
            PeerResponse { slot_id: 3, agent_id: "verdant".into(), text: "world".into() },
        ];
        let prompt = render_turn2_prompt(1, "lumen", &peers);
        assert!(prompt.contains("slot 2 (tidal): hello"));
        assert!(prompt.contains("slot 3 (verdant): world"));
    }
}
