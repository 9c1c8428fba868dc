use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use crate::message::PromptRequest;
use crate::schema::{
    comment_schema, parse_comment, parse_sentiment, parse_spoken, sentiment_schema, spoken_schema,
    SentimentResponse, SpokenResponse, Turn2Response,
};
use crate::LlmError;

/// The five structured-output shapes the turn engine ever asks for. One
/// backend serves all of them through a single schema-descriptor-driven
/// HTTP call (Design Notes: "dynamic structured output maps to tagged
/// variants").
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_turn1(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError>;
    async fn generate_turn2(&self, req: &PromptRequest) -> Result<Turn2Response, LlmError>;
    async fn generate_turn3(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError>;
    async fn generate_turn4(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError>;
    async fn generate_sentiment(&self, req: &PromptRequest) -> Result<SentimentResponse, LlmError>;
}

/// Talks to an OpenAI-compatible chat-completions endpoint with a JSON
/// schema attached to the request (`response_format: json_schema`), with
/// retry and exponential backoff for transient network/5xx failures.
pub struct HttpLlmClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http: Client::new(), endpoint: endpoint.into(), api_key }
    }

    async fn complete_json(
        &self,
        req: &PromptRequest,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, LlmError> {
        let body = json!({
            "model": req.model,
            "messages": req.messages,
            "temperature": req.temperature,
            "max_tokens": req.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": schema_name, "schema": schema, "strict": true },
            },
        });

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);

        loop {
            attempt += 1;
            let mut request = self.http.post(&self.endpoint).timeout(req.timeout).json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let outcome = tokio::time::timeout(req.timeout, request.send()).await;

            let result = match outcome {
                Err(_) => Err(LlmError::Timeout(req.timeout)),
                Ok(Err(e)) => Err(LlmError::from(e)),
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        Err(LlmError::Api { status: status.as_u16(), body: text })
                    } else if !status.is_success() {
                        let text = response.text().await.unwrap_or_default();
                        return Err(LlmError::Api { status: status.as_u16(), body: text });
                    } else {
                        let parsed: Value =
                            response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
                        extract_structured_content(parsed)
                    }
                }
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= req.max_retries => {
                    warn!(attempt, %err, "llm request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(_) => return Err(LlmError::RetriesExhausted(req.max_retries)),
            }
        }
    }
}

/// Pulls the first choice's message content out of a chat-completions
/// envelope and parses it as JSON (the structured payload the schema forced
/// the model to emit).
fn extract_structured_content(envelope: Value) -> Result<Value, LlmError> {
    let content = envelope
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))?;

    serde_json::from_str(content).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_turn1(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        let value = self.complete_json(req, "turn1_response", spoken_schema()).await?;
        parse_spoken(value)
    }

    async fn generate_turn2(&self, req: &PromptRequest) -> Result<Turn2Response, LlmError> {
        let value = self.complete_json(req, "turn2_response", comment_schema()).await?;
        parse_comment(value)
    }

    async fn generate_turn3(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        let value = self.complete_json(req, "turn3_response", spoken_schema()).await?;
        parse_spoken(value)
    }

    async fn generate_turn4(&self, req: &PromptRequest) -> Result<SpokenResponse, LlmError> {
        let value = self.complete_json(req, "turn4_response", spoken_schema()).await?;
        parse_spoken(value)
    }

    async fn generate_sentiment(&self, req: &PromptRequest) -> Result<SentimentResponse, LlmError> {
        let value = self.complete_json(req, "sentiment_response", sentiment_schema()).await?;
        parse_sentiment(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content_from_chat_envelope() {
        let envelope = json!({
            "choices": [{ "message": { "content": "{\"text\":\"hi\",\"voice_profile\":\"calm_soothing\"}" } }]
        });
        let value = extract_structured_content(envelope).unwrap();
        assert_eq!(value["text"], "hi");
    }

    #[test]
    fn missing_content_is_invalid_response() {
        let envelope = json!({ "choices": [] });
        assert!(matches!(extract_structured_content(envelope), Err(LlmError::InvalidResponse(_))));
    }
}
