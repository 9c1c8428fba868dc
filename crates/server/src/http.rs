//! HTTP endpoints, all under `/v1` (spec.md §6).
//!
//! Grounded in the teacher's `crates/server/src/http.rs`: router assembly,
//! CORS-layer construction from configured origins, and the
//! `State<AppState>` extractor pattern.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use resonance_core::{SlotAssignment, SlotId};
use resonance_engine::BroadcastRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::controller_ws::events_handler;
use crate::state::AppState;
use crate::ServerError;

/// 25 MB, per spec.md §6: uploads beyond this are rejected with 413 before
/// the handler ever runs.
const STT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.settings.cors_origins);
    let audio_service = ServeDir::new(&state.artifacts_dir);

    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/agents", get(agents))
        .route("/v1/chat", post(chat))
        .route("/v1/reset", post(reset))
        .route(
            "/v1/stt",
            post(stt).layer(DefaultBodyLimit::max(STT_MAX_UPLOAD_BYTES)),
        )
        .route("/v1/events", get(events_handler))
        .nest_service("/v1/audio", audio_service)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Builds the CORS layer from `Settings::cors_origins`. An empty list is
/// development-mode permissive (matching the teacher's `build_cors_layer`
/// fallback, minus its `cors_enabled` flag, which this spec doesn't carry).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        warn!("no cors_origins configured, allowing all origins");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                warn!(origin, "invalid cors origin, skipping");
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        warn!("all configured cors_origins were invalid, allowing all origins");
        return CorsLayer::new().allow_origin(Any).allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_credentials(true)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn agents(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "agents": state.agents.as_ref() }))
}

#[derive(Debug, Deserialize)]
struct SlotAssignmentBody {
    #[serde(rename = "slotId")]
    slot_id: u8,
    #[serde(rename = "agentId")]
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    message: String,
    slots: Vec<SlotAssignmentBody>,
}

fn parse_slots(body: &ChatRequestBody) -> Result<Vec<SlotAssignment>, ServerError> {
    if body.message.trim().is_empty() {
        return Err(ServerError::InvalidRequest("message must be non-empty".to_string()));
    }
    if body.slots.is_empty() || body.slots.len() > 6 {
        return Err(ServerError::InvalidRequest("slots must have 1..6 entries".to_string()));
    }

    let mut assignments = Vec::with_capacity(body.slots.len());
    let mut seen = std::collections::HashSet::new();
    for slot in &body.slots {
        let slot_id = SlotId::new(slot.slot_id)
            .map_err(|err| ServerError::InvalidRequest(err.to_string()))?;
        if !seen.insert(slot_id) {
            return Err(ServerError::InvalidRequest(format!("duplicate slotId {slot_id}")));
        }
        assignments.push(SlotAssignment { slot_id, agent_id: slot.agent_id.clone() });
    }
    Ok(assignments)
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<Value>)> {
    let slots = parse_slots(&body).map_err(server_error_response)?;

    let request = BroadcastRequest { session_id: Uuid::new_v4(), slots, user_message: body.message };
    let mut rx = state.engine.clone().run_broadcast(request);

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let frame = Event::default().event(event.name).json_data(event.data);
            match frame {
                Ok(frame) => yield Ok(frame),
                Err(err) => warn!(%err, "failed to encode sse frame, dropping event"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

async fn reset(State(state): State<AppState>) -> Json<Value> {
    let cleared: Vec<u8> = state.conversations.reset_all().into_iter().map(SlotId::get).collect();
    Json(json!({ "status": "ok", "clearedSlots": cleared }))
}

#[derive(Debug, Serialize)]
struct SttResponseBody {
    stt_session_id: String,
    transcript: String,
    audio_path: String,
    transcript_path: String,
    duration_ms: u64,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    words: Option<Vec<resonance_audio::WordTiming>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
}

async fn stt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SttResponseBody>, (StatusCode, Json<Value>)> {
    let mut audio_bytes: Option<Vec<u8>> = None;
    let mut file_name = "input.wav".to_string();
    let mut mime_type = "audio/wav".to_string();
    let mut language_code: Option<String> = None;

    loop {
        let field = multipart.next_field().await.map_err(|err| {
            server_error_response(ServerError::InvalidRequest(err.to_string()))
        })?;
        let Some(field) = field else { break };

        match field.name().unwrap_or_default() {
            "file" => {
                file_name = field.file_name().unwrap_or("input.wav").to_string();
                mime_type = field.content_type().unwrap_or("audio/wav").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    server_error_response(ServerError::InvalidRequest(err.to_string()))
                })?;
                if bytes.len() > STT_MAX_UPLOAD_BYTES {
                    return Err(server_error_response(ServerError::PayloadTooLarge));
                }
                audio_bytes = Some(bytes.to_vec());
            }
            "language_code" => {
                let text = field.text().await.map_err(|err| {
                    server_error_response(ServerError::InvalidRequest(err.to_string()))
                })?;
                if !text.is_empty() {
                    language_code = Some(text);
                }
            }
            _ => {}
        }
    }

    let Some(audio_bytes) = audio_bytes else {
        return Err(server_error_response(ServerError::InvalidRequest("missing file field".to_string())));
    };

    let session_id = Uuid::new_v4();
    let stt_session = resonance_session::SttSession::new(&state.artifacts_dir, session_id);
    stt_session
        .ensure_layout()
        .await
        .map_err(|err| server_error_response(ServerError::Internal(err.to_string())))?;

    let extension = extension_for_mime(&mime_type, &file_name);
    let input_path = stt_session.input_path(extension);
    tokio::fs::write(&input_path, &audio_bytes)
        .await
        .map_err(|err| server_error_response(ServerError::Internal(err.to_string())))?;

    let transcription = state
        .stt
        .transcribe(audio_bytes, &file_name, language_code.as_deref())
        .await
        .map_err(|err| server_error_response(ServerError::VendorError(err.to_string())))?;

    if transcription.text.trim().is_empty() {
        return Err(server_error_response(ServerError::UnprocessableTranscript));
    }

    stt_session
        .write_transcript(&transcription.text, &state.settings.stt_model)
        .await
        .map_err(|err| server_error_response(ServerError::Internal(err.to_string())))?;

    let audio_rel = format!("stt/sessions/{session_id}/input.{extension}");
    let transcript_rel = format!("stt/sessions/{session_id}/transcript.txt");

    Ok(Json(SttResponseBody {
        stt_session_id: session_id.to_string(),
        transcript: transcription.text,
        audio_path: audio_rel,
        transcript_path: transcript_rel,
        duration_ms: transcription.duration_ms,
        mime_type,
        words: (!transcription.words.is_empty()).then_some(transcription.words),
        language_code: transcription.language_code.or(language_code),
    }))
}

fn extension_for_mime<'a>(mime_type: &'a str, file_name: &'a str) -> &'a str {
    match mime_type {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => file_name.rsplit('.').next().unwrap_or("wav"),
    }
}

fn server_error_response(err: ServerError) -> (StatusCode, Json<Value>) {
    let status: StatusCode = match &err {
        ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ServerError::UnprocessableTranscript => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::VendorError(_) => StatusCode::BAD_GATEWAY,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_slots_rejects_duplicate_slot_ids() {
        let body = ChatRequestBody {
            message: "hi".to_string(),
            slots: vec![
                SlotAssignmentBody { slot_id: 1, agent_id: "lumen".to_string() },
                SlotAssignmentBody { slot_id: 1, agent_id: "tidal".to_string() },
            ],
        };
        assert!(parse_slots(&body).is_err());
    }

    #[test]
    fn parse_slots_rejects_empty_message() {
        let body = ChatRequestBody {
            message: "   ".to_string(),
            slots: vec![SlotAssignmentBody { slot_id: 1, agent_id: "lumen".to_string() }],
        };
        assert!(parse_slots(&body).is_err());
    }

    #[test]
    fn parse_slots_accepts_valid_request() {
        let body = ChatRequestBody {
            message: "hello".to_string(),
            slots: vec![
                SlotAssignmentBody { slot_id: 3, agent_id: "lumen".to_string() },
                SlotAssignmentBody { slot_id: 5, agent_id: "tidal".to_string() },
            ],
        };
        let assignments = parse_slots(&body).unwrap();
        assert_eq!(assignments.len(), 2);
    }
}
