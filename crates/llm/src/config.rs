use std::time::Duration;

use crate::error::LlmError;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Chat completions endpoint configuration loaded from environment variables.
///
/// | Env var            | Default                            |
/// |--------------------|------------------------------------|
/// | `LLM_API_KEY`      | (required)                         |
/// | `LLM_BASE_URL`     | `https://api.groq.com/openai/v1`   |
/// | `LLM_MODEL`        | `llama-3.1-8b-instant`             |
/// | `LLM_TIMEOUT_SECS` | `30`                               |
///
/// `GROQ_API_KEY` is accepted when `LLM_API_KEY` is unset.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("GROQ_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let timeout_secs: u64 = std::env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .unwrap_or(30);

        Ok(Self {
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_joins_base() {
        let config = LlmConfig {
            api_key: "k".into(),
            base_url: "http://localhost:8080/v1".into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            config.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert!(!format!("{config:?}").contains("api_key"));
    }
}
