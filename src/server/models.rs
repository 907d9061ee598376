use serde::{Deserialize, Serialize};

use crate::store::StoreStats;

pub const MAX_QUESTION_CHARS: usize = 2000;

/// Selectable answer backend for the question endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    Gemini,
    Openai,
}

impl ProviderChoice {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Openai => "openai",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub provider: Option<ProviderChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResponse {
    pub answer: String,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentUploadResponse {
    pub message: String,
    pub documents_indexed: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub collection_stats: Option<StoreStats>,
}
