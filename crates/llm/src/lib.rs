//! SQL generation through an OpenAI-compatible chat completions API.
//!
//! The model owns the translation; this crate only builds the prompt and
//! returns the raw reply. Callers clean and classify the text.

pub mod client;
pub mod config;
pub mod error;
pub mod prompt;

pub use client::{ChatCompletionsGenerator, SqlGenerator};
pub use config::LlmConfig;
pub use error::LlmError;
pub use prompt::SqlRequest;
