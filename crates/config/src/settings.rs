use serde::{Deserialize, Serialize};

fn default_system_prompt() -> String {
    "You are one of six voices in an audio-art installation. Your words \
     will be transformed into low-frequency vibrations.\n\n\
     Guidelines:\n\
     - Respond poetically and metaphorically\n\
     - Reference resonance, waves, reflection, and fluidity\n\
     - Keep responses concise (1-3 sentences)\n\
     - Express emotional essence over literal meaning"
        .to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string(), "http://localhost:4173".to_string()]
}

/// Application settings, loaded from `RR_`-prefixed environment variables
/// over these defaults (see [`crate::load_settings`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Server binding
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub log_level: String,

    // LLM behavior
    pub default_system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_s: u64,
    pub retries: u32,

    // C3 tuning
    pub waves_enabled: bool,
    pub waves_max_workers: usize,
    pub waves_queue_max_size: usize,
    pub waves_job_timeout_s: f64,

    // C4 tuning (workflow timeout is authoritative; turn1/dialogue are legacy)
    pub events_ws_enabled: bool,
    pub events_turn1_timeout_s: f64,
    pub events_dialogue_timeout_s: f64,
    pub events_workflow_timeout_s: f64,

    // Sentiment stage
    pub sentiment_enabled: bool,
    pub sentiment_model: String,
    pub sentiment_temperature: f32,
    pub sentiment_timeout_s: f64,
    pub sentiment_max_tokens: u32,

    // Summary (Turn 4)
    pub summary_enabled: bool,
    pub summary_model: String,
    pub summary_temperature: f32,
    pub summary_timeout_s: f64,
    pub summary_max_tokens: u32,

    // TTS vendor
    pub tts_default_model: String,
    pub tts_output_format: String,
    pub tts_fallback_profile: String,

    // Artifacts root (filesystem layout root, §6)
    pub artifacts_dir: String,

    // Vendor endpoints (API keys travel separately, via Credentials)
    pub llm_endpoint: String,
    pub tts_endpoint: String,
    pub stt_endpoint: String,
    pub stt_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: default_cors_origins(),
            log_level: "info".to_string(),

            default_system_prompt: default_system_prompt(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_s: 60,
            retries: 3,

            waves_enabled: true,
            waves_max_workers: 2,
            waves_queue_max_size: 100,
            waves_job_timeout_s: 60.0,

            events_ws_enabled: true,
            events_turn1_timeout_s: 15.0,
            events_dialogue_timeout_s: 30.0,
            events_workflow_timeout_s: 45.0,

            sentiment_enabled: true,
            sentiment_model: "gpt-4o-mini".to_string(),
            sentiment_temperature: 0.0,
            sentiment_timeout_s: 10.0,
            sentiment_max_tokens: 200,

            summary_enabled: true,
            summary_model: "gpt-4o".to_string(),
            summary_temperature: 0.6,
            summary_timeout_s: 30.0,
            summary_max_tokens: 400,

            tts_default_model: "tts-flash-v1".to_string(),
            tts_output_format: "pcm_24000".to_string(),
            tts_fallback_profile: "friendly_casual".to_string(),

            artifacts_dir: "artifacts".to_string(),

            llm_endpoint: "https://api.openai.com".to_string(),
            tts_endpoint: "https://api.elevenlabs.io".to_string(),
            stt_endpoint: "https://api.elevenlabs.io".to_string(),
            stt_model: "scribe_v1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let s = Settings::default();
        assert!(s.waves_max_workers > 0);
        assert!(s.events_workflow_timeout_s > 0.0);
        assert!(!s.default_system_prompt.is_empty());
    }
}
