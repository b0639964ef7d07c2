//! JSON bodies exchanged with the chat endpoint.

use serde::{Deserialize, Serialize};

use crate::session::SessionToken;

/// Client → server: one question, tagged with the session it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub session_id: &'a SessionToken,
}

impl<'a> ChatRequest<'a> {
    pub fn new(question: &'a str, session_id: &'a SessionToken) -> Self {
        Self {
            question,
            session_id,
        }
    }
}

/// Server → client on failure: `{"error": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    /// Pull the `error` field out of a failure body, or fall back to the raw text.
    pub fn detail(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.error,
            Err(_) => body.trim().to_string(),
        }
    }
}
