use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::extract::DocumentProcessor;
use crate::llm::LlmService;
use crate::server::{self, AppState};
use crate::store::VectorStore;
use crate::{RagError, Result};

fn load_config(base_dir: Option<PathBuf>) -> Result<Config> {
    let base_dir = match base_dir {
        Some(dir) => dir,
        None => Config::default_base_dir()
            .map_err(|e| RagError::Config(e.to_string()))?,
    };
    Ok(Config::load(base_dir)?)
}

fn open_store(config: &Config) -> Result<Arc<VectorStore>> {
    let embedder: Arc<dyn Embedder> = Arc::new(OllamaClient::new(&config.ollama)?);
    Ok(Arc::new(VectorStore::open(
        config.store_dir(),
        config.storage.collection_name.clone(),
        config.retrieval.top_k,
        embedder,
    )?))
}

/// Start the HTTP server.
#[inline]
pub async fn serve(base_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(base_dir)?;

    let embedder = OllamaClient::new(&config.ollama)?;
    if let Err(e) = embedder.ping() {
        // The embedding backend may come up later; indexing will fail until it does
        warn!("Ollama server not reachable at startup: {}", e);
    }

    let store = Arc::new(VectorStore::open(
        config.store_dir(),
        config.storage.collection_name.clone(),
        config.retrieval.top_k,
        Arc::new(embedder),
    )?);
    let llm = Arc::new(LlmService::new(&config.llm));
    let processor = DocumentProcessor::new(&config.chunking);

    info!(
        "Starting kb-rag: model={}, chunk_size={}, top_k={}",
        config.ollama.model, config.chunking.chunk_size, config.retrieval.top_k
    );

    let state = Arc::new(AppState {
        store,
        llm,
        processor,
    });
    server::serve(&config, state).await
}

/// Print store statistics.
#[inline]
pub fn show_status(base_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(base_dir)?;
    let store = open_store(&config)?;
    let stats = store.stats()?;

    println!("Collection: {}", stats.collection_name);
    println!("Documents:  {}", stats.total_documents);
    println!("Chunks:     {}", stats.total_chunks);
    if let Some(at) = store.last_indexed_at()? {
        println!("Last index: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

/// Print the indexed document sources.
#[inline]
pub fn list_documents(base_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(base_dir)?;
    let store = open_store(&config)?;
    let sources = store.list_sources()?;

    if sources.is_empty() {
        println!("No documents indexed.");
    } else {
        for source in sources {
            println!("{}", source);
        }
    }
    Ok(())
}

/// Delete a document and its embeddings.
#[inline]
pub fn delete_document(base_dir: Option<PathBuf>, source: &str) -> Result<()> {
    let config = load_config(base_dir)?;
    let store = open_store(&config)?;

    if store.delete_by_source(source)? {
        println!("Document '{}' deleted.", source);
    } else {
        println!("Document '{}' not found.", source);
    }
    Ok(())
}

/// Drop the entire index and metadata log.
#[inline]
pub fn reset_store(base_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(base_dir)?;
    let store = open_store(&config)?;
    store.reset()?;
    println!("Vector store reset.");
    Ok(())
}

/// Print the effective configuration with credentials masked.
#[inline]
pub fn show_config(base_dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(base_dir)?;
    if !config.llm.gemini_api_key.is_empty() {
        config.llm.gemini_api_key = "********".to_string();
    }
    if !config.llm.openai_api_key.is_empty() {
        config.llm.openai_api_key = "********".to_string();
    }

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| RagError::Config(format!("Failed to render config: {}", e)))?;
    println!("# {}", config.base_dir.join("config.toml").display());
    println!("{}", rendered);
    Ok(())
}
