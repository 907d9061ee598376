use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::LlmProvider;
use crate::{RagError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// OpenAI backend using the chat completions REST API.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

impl OpenAiProvider {
    #[inline]
    pub fn new(config: &LlmConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
            agent,
        }
    }

    /// Override the API endpoint, for tests against a mock server.
    #[inline]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl LlmProvider for OpenAiProvider {
    #[inline]
    fn name(&self) -> &'static str {
        "openai"
    }

    #[inline]
    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[inline]
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to serialize request: {}", e)))?;

        debug!("Calling OpenAI model {}", self.model);

        let auth_header = format!("Bearer {}", self.api_key);
        let response_text = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", auth_header.as_str())
            .send(request_json.as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| RagError::Other(anyhow::anyhow!("OpenAI request failed: {}", e)))?;

        let mut response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Other(anyhow::anyhow!("Invalid OpenAI response: {}", e)))?;

        if response.choices.is_empty() {
            return Err(RagError::Other(anyhow::anyhow!(
                "OpenAI response contained no choices"
            )));
        }

        Ok(response.choices.remove(0).message.content.trim().to_string())
    }
}
