// Embedding generation
// Wraps the Ollama embedding API behind the Embedder trait so the vector
// store can be driven by a mock in tests.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// A text-to-vector embedding backend.
///
/// Vectors have a fixed dimension determined by the underlying model and
/// discovered from the first response. Identical input and model version
/// produce identical vectors.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>>;
}
