pub mod types;
pub mod prompt;
pub mod parser;
pub mod retry;
pub mod gemini;
pub mod engine;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use retry::*;
pub use gemini::*;
pub use engine::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{} not found in environment", crate::config::API_KEY_ENV)]
    MissingApiKey,

    #[error("Cannot reach the model service at {0}")]
    Connection(String),

    #[error("Model service rate limit hit (429): {0}")]
    RateLimited(String),

    #[error("Model service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl EngineError {
    /// Quota signal: a dedicated variant, an HTTP 429, or a message that
    /// carries the status code.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            EngineError::RateLimited(_) => true,
            EngineError::Api { status: 429, .. } => true,
            other => other.to_string().contains("429"),
        }
    }

    /// Output noise from the model rather than a transport problem.
    pub fn is_malformed_output(&self) -> bool {
        matches!(
            self,
            EngineError::JsonParsing(_) | EngineError::MalformedResponse(_)
        )
    }
}
