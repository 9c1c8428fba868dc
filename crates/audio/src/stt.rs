use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SttError {
    #[error("network error: {0}")]
    Network(String),

    #[error("vendor api error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("response did not contain a transcript")]
    MissingTranscript,
}

impl From<reqwest::Error> for SttError {
    fn from(err: reqwest::Error) -> Self {
        SttError::Network(err.to_string())
    }
}

/// One word's timing, carried straight through from the vendor's Scribe-style
/// response (`original_source/backend/stt/models.py`'s `WordTiming`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start: f32,
    pub end: f32,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A completed transcription. `duration_ms` is derived from the last word's
/// end timestamp when word timings are present, `0` otherwise — the vendor
/// response this is grounded on carries no dedicated duration field.
#[derive(Debug, Clone)]
pub struct SttTranscription {
    pub text: String,
    pub duration_ms: u64,
    pub words: Vec<WordTiming>,
    pub language_code: Option<String>,
}

/// Transcribes an uploaded audio clip. Grounded in the original's
/// `stt/elevenlabs_stt.py` client shape: one request, one transcript, no
/// streaming (spec.md Non-goals: "no streaming token delivery" extends to
/// STT too).
#[async_trait]
pub trait SttClient: Send + Sync {
    async fn transcribe(
        &self,
        audio_bytes: Vec<u8>,
        file_name: &str,
        language_code: Option<&str>,
    ) -> Result<SttTranscription, SttError>;
}

pub struct HttpSttClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpSttClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self { http: Client::new(), endpoint: endpoint.into(), api_key, model: model.into() }
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    words: Vec<WordTiming>,
    #[serde(default)]
    language_code: Option<String>,
}

#[async_trait]
impl SttClient for HttpSttClient {
    async fn transcribe(
        &self,
        audio_bytes: Vec<u8>,
        file_name: &str,
        language_code: Option<&str>,
    ) -> Result<SttTranscription, SttError> {
        let part = Part::bytes(audio_bytes).file_name(file_name.to_string());
        let mut form = Form::new().part("file", part).text("model", self.model.clone());
        if let Some(code) = language_code {
            form = form.text("language_code", code.to_string());
        }

        let mut request = self.http.post(format!("{}/v1/audio/transcriptions", self.endpoint)).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Api { status: status.as_u16(), body });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.filter(|t| !t.is_empty()).ok_or(SttError::MissingTranscript)?;
        let duration_ms = parsed.words.last().map(|w| (w.end * 1000.0) as u64).unwrap_or(0);
        Ok(SttTranscription { text, duration_ms, words: parsed.words, language_code: parsed.language_code })
    }
}
