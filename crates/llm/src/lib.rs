//! LLM collaborator contract.
//!
//! The turn engine never talks to a vendor SDK directly — it calls one of
//! the five structured-output methods on [`LlmClient`], each backed by a
//! JSON-schema descriptor (see [`schema`]) so a single HTTP backend can
//! serve every turn shape without per-turn client code (Design Notes:
//! "dynamic structured output maps to tagged variants").

pub mod backend;
pub mod message;
pub mod schema;

pub use backend::{HttpLlmClient, LlmClient};
pub use message::{Message, PromptRequest, Role};
pub use schema::{
    CommentSelection, SentimentResponse, SpokenResponse, Turn1Response, Turn2Response,
    Turn3Response, Turn4Response,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("vendor api error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("response did not match the expected structured output shape: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("exhausted {0} retries")]
    RetriesExhausted(u32),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}
