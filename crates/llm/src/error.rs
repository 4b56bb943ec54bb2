//! Error types for SQL generation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("LLM API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Missing LLM API key")]
    MissingApiKey,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}
