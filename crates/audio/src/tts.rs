use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use resonance_core::VoiceProfile;
use thiserror::Error;

use crate::wav::write_mono_wav;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("network error: {0}")]
    Network(String),

    #[error("vendor api error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to write audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode wav: {0}")]
    Wav(#[from] hound::Error),
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        TtsError::Network(err.to_string())
    }
}

/// Synthesizes text into speech for one of the six fixed [`VoiceProfile`]s
/// and writes the result as a WAV file at `output_path`.
///
/// Grounded in the original's ElevenLabs-backed multi-voice client; the
/// vendor API and voice-ID mapping are collaborator details hidden behind
/// this trait (spec.md Non-goals: "vendor-specific voice tuning").
#[async_trait]
pub trait TtsClient: Send + Sync {
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice_profile: VoiceProfile,
        output_path: &Path,
    ) -> Result<(), TtsError>;
}

/// Maps each fixed voice profile to a vendor voice identifier. Unknown
/// profiles can't occur (`VoiceProfile` is a closed enum) so this never
/// needs a fallback branch.
fn vendor_voice_id(profile: VoiceProfile) -> &'static str {
    match profile {
        VoiceProfile::FriendlyCasual => "voice-friendly-casual",
        VoiceProfile::WarmProfessional => "voice-warm-professional",
        VoiceProfile::EnergeticUpbeat => "voice-energetic-upbeat",
        VoiceProfile::CalmSoothing => "voice-calm-soothing",
        VoiceProfile::ConfidentCharming => "voice-confident-charming",
        VoiceProfile::PlayfulExpressive => "voice-playful-expressive",
    }
}

pub struct HttpTtsClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    sample_rate: u32,
}

impl HttpTtsClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http: Client::new(), endpoint: endpoint.into(), api_key, sample_rate: 44_100 }
    }
}

#[async_trait]
impl TtsClient for HttpTtsClient {
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice_profile: VoiceProfile,
        output_path: &Path,
    ) -> Result<(), TtsError> {
        let voice_id = vendor_voice_id(voice_profile);
        let mut request = self.http.post(format!("{}/v1/text-to-speech/{voice_id}", self.endpoint)).json(
            &serde_json::json!({
                "text": text,
                "output_format": "pcm_44100",
            }),
        );
        if let Some(key) = &self.api_key {
            request = request.header("xi-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        let samples = pcm16le_bytes_to_f32(&bytes);

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let path = output_path.to_path_buf();
        let samples_owned = samples;
        let sample_rate = self.sample_rate;
        tokio::task::spawn_blocking(move || write_mono_wav(&path, &samples_owned, sample_rate))
            .await
            .expect("write_mono_wav task panicked")?;
        Ok(())
    }
}

fn pcm16le_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / i16::MAX as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_profile_has_a_distinct_vendor_voice() {
        let ids: Vec<_> = VoiceProfile::ALL.iter().map(|p| vendor_voice_id(*p)).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }
}
