/// Vendor credentials threaded explicitly to the clients that need them,
/// instead of being pushed into process environment variables as a
/// side-effect of importing the config module (Design Notes: "configuration
/// cascade").
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub tts_api_key: Option<String>,
    pub stt_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("tts_api_key", &self.tts_api_key.as_ref().map(|_| "<redacted>"))
            .field("stt_api_key", &self.stt_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn env_var(prefixed: &str, bare: &str) -> Option<String> {
    std::env::var(prefixed).ok().filter(|v| !v.is_empty()).or_else(|| {
        std::env::var(bare).ok().filter(|v| !v.is_empty())
    })
}

impl Credentials {
    /// Checks both the `RR_`-prefixed and bare environment variable names,
    /// matching the original's cascade.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_var("RR_OPENAI_API_KEY", "OPENAI_API_KEY"),
            anthropic_api_key: env_var("RR_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY"),
            google_api_key: env_var("RR_GOOGLE_API_KEY", "GOOGLE_API_KEY"),
            tts_api_key: env_var("RR_TTS_API_KEY", "TTS_API_KEY"),
            stt_api_key: env_var("RR_STT_API_KEY", "STT_API_KEY"),
        }
    }
}
