
pub mod gemini;
pub mod openai;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::store::QueryResult;
use crate::{RagError, Result};

pub const SYSTEM_PROMPT: &str = "You are a knowledgeable assistant that answers questions based ONLY on the provided context.

Rules:
1. Answer the question using ONLY the information from the context below.
2. If the context does not contain enough information to answer the question, say so clearly.
3. Be precise and concise in your answers.
4. When possible, quote the relevant parts from the context.
5. Answer in the same language as the question.";

pub const NO_CONTEXT_ANSWER: &str = "No relevant documents found to answer this question. \
    Please upload relevant documents first.";

/// A single LLM backend.
///
/// Availability means a credential is configured; it does not probe the
/// network. `generate` must fail loudly on transport or API errors rather
/// than returning partial output.
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Generated answer plus the chunk texts it was grounded on, in retrieval
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub references: Vec<String>,
}

/// Multi-provider answering orchestrator.
///
/// Providers are registered once at construction, in fixed priority order,
/// keeping only those that report themselves configured. Each call tries the
/// candidates once each, in order, substituting the next backend on failure.
pub struct LlmService {
    providers: Vec<Box<dyn LlmProvider>>,
}

impl LlmService {
    #[inline]
    pub fn new(config: &LlmConfig) -> Self {
        let candidates: Vec<Box<dyn LlmProvider>> = vec![
            Box::new(GeminiProvider::new(config)),
            Box::new(OpenAiProvider::new(config)),
        ];
        let providers: Vec<Box<dyn LlmProvider>> = candidates
            .into_iter()
            .filter(|p| p.is_available())
            .collect();

        if providers.is_empty() {
            warn!("No LLM providers configured; set GEMINI_API_KEY or OPENAI_API_KEY");
        } else {
            let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
            info!("LLM providers available: {:?}", names);
        }

        Self { providers }
    }

    /// Build a service from an explicit provider list, bypassing the
    /// availability filter. Used by tests and kept out of the public wiring.
    #[inline]
    pub fn from_providers(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    #[inline]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Answer a question from retrieved chunks, falling back across
    /// providers in priority order.
    ///
    /// With no retrieved chunks this short-circuits to a fixed
    /// no-context answer without touching any provider. A requested provider
    /// restricts the candidate list to that provider alone.
    #[inline]
    pub fn generate_answer(
        &self,
        question: &str,
        context_chunks: &[QueryResult],
        requested_provider: Option<&str>,
    ) -> Result<Answer> {
        if context_chunks.is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                references: Vec::new(),
            });
        }

        if self.providers.is_empty() {
            return Err(RagError::NoProvidersConfigured);
        }

        let candidates: Vec<&dyn LlmProvider> = match requested_provider {
            Some(name) => {
                let matched: Vec<&dyn LlmProvider> = self
                    .providers
                    .iter()
                    .map(|p| p.as_ref())
                    .filter(|p| p.name() == name)
                    .collect();
                if matched.is_empty() {
                    return Err(RagError::ProviderNotAvailable(name.to_string()));
                }
                matched
            }
            None => self.providers.iter().map(|p| p.as_ref()).collect(),
        };

        let context = build_context(context_chunks);
        let user_prompt = format!(
            "Context:\n{context}\n\n---\n\nQuestion: {question}\n\n\
             Provide a precise answer based on the context above. \
             Include relevant quotes as references."
        );

        let mut last_failure: Option<(&'static str, String)> = None;
        for provider in candidates {
            info!("Trying LLM provider: {}", provider.name());
            match provider.generate(SYSTEM_PROMPT, &user_prompt) {
                Ok(answer) => {
                    info!("Answer generated via {}", provider.name());
                    return Ok(Answer {
                        answer,
                        references: context_chunks.iter().map(|c| c.text.clone()).collect(),
                    });
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    last_failure = Some((provider.name(), e.to_string()));
                }
            }
        }

        let (provider, message) = last_failure
            .map_or_else(|| ("unknown", "no providers attempted".to_string()), |f| f);
        Err(RagError::AllProvidersFailed {
            provider: provider.to_string(),
            message,
        })
    }
}

/// Concatenate chunks into a grounding prompt, keeping retrieval order.
fn build_context(chunks: &[QueryResult]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {}, Page {}]\n{}",
                i + 1,
                chunk.metadata.source,
                chunk.metadata.page,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
