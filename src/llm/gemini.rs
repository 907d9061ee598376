use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::LlmProvider;
use crate::{RagError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// Google Gemini backend using the generateContent REST API.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiProvider {
    #[inline]
    pub fn new(config: &LlmConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
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

impl LlmProvider for GeminiProvider {
    #[inline]
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[inline]
    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[inline]
    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user_prompt.to_string(),
                }],
            }],
            system_instruction: Content {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to serialize request: {}", e)))?;

        debug!("Calling Gemini model {}", self.model);

        let response_text = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(request_json.as_str())
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| RagError::Other(anyhow::anyhow!("Gemini request failed: {}", e)))?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Other(anyhow::anyhow!("Invalid Gemini response: {}", e)))?;

        let text = response
            .candidates
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .and_then(|c| c.content)
            .and_then(|mut content| {
                if content.parts.is_empty() {
                    None
                } else {
                    Some(content.parts.remove(0).text)
                }
            })
            .ok_or_else(|| {
                RagError::Other(anyhow::anyhow!("Gemini response contained no candidate text"))
            })?;

        Ok(text.trim().to_string())
    }
}
