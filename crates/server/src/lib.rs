//! Request Surface (C6): HTTP + WebSocket entry points for the turn
//! workflow engine.
//!
//! Grounded in the teacher's `crates/server` layout (`http.rs`'s router
//! construction, `lib.rs`'s `ServerError` -> `StatusCode` mapping) and
//! `original_source/backend/main.py` / `streaming.py` for the endpoint set.

pub mod controller_ws;
pub mod conversation;
pub mod http;
pub mod state;

pub use conversation::ConversationStore;
pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors the HTTP layer can return; each maps to the status code spec.md
/// §6 names for that failure mode.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upload too large")]
    PayloadTooLarge,

    #[error("transcript empty or missing")]
    UnprocessableTranscript,

    #[error("vendor error: {0}")]
    VendorError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::UnprocessableTranscript => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::VendorError(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
