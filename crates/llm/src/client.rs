//! Chat completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::prompt::{build_messages, Message, SqlRequest};

/// Anything that can turn a question into SQL text.
///
/// The returned text is raw model output; it may still contain fences,
/// comments or several statements.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, request: &SqlRequest) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// [`SqlGenerator`] backed by an OpenAI-compatible `/chat/completions` API.
#[derive(Clone, Debug)]
pub struct ChatCompletionsGenerator {
    http_client: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

/// First choice's content, trimmed.
fn first_choice_text(completion: ChatCompletionResponse) -> Result<String, LlmError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("No content in response".to_string()))
}

#[async_trait]
impl SqlGenerator for ChatCompletionsGenerator {
    async fn generate_sql(&self, request: &SqlRequest) -> Result<String, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: build_messages(request),
            temperature: 0.0,
            max_tokens: 512,
        };

        tracing::debug!(model = %self.config.model, "Sending SQL generation request");

        let response = self
            .http_client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, body_len = body.len(), "LLM API error");
            return Err(LlmError::Api {
                status,
                message: "upstream error".to_string(),
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        first_choice_text(completion)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
