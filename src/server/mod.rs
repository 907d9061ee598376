#[cfg(test)]
mod tests;

pub mod models;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::extract::DocumentProcessor;
use crate::llm::LlmService;
use crate::store::VectorStore;
use crate::{RagError, Result};
use models::{
    DocumentListResponse, DocumentUploadResponse, ErrorResponse, HealthResponse,
    MAX_QUESTION_CHARS, MessageResponse, QuestionRequest, QuestionResponse,
};

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared state behind every request handler.
pub struct AppState {
    pub store: Arc<VectorStore>,
    pub llm: Arc<LlmService>,
    pub processor: DocumentProcessor,
}

type SharedState = Arc<AppState>;

/// Error response carrying an HTTP status and a human-readable detail.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        Self::internal(e.to_string())
    }
}

/// Build the application router.
#[inline]
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/documents", post(upload_documents).get(list_documents))
        .route("/documents/{filename}", delete(delete_document))
        .route("/question", post(ask_question))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn serve(config: &Config, state: SharedState) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Server error: {}", e)))?;
    Ok(())
}

/// Upload one or more PDF documents for indexing.
///
/// Files are processed independently: a file that fails to parse is reported
/// as a warning while the remaining files continue. The request only fails
/// outright when no file could be indexed.
async fn upload_documents(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<DocumentUploadResponse>, ApiError> {
    let mut total_chunks = 0usize;
    let mut documents_indexed = 0usize;
    let mut errors: Vec<String> = Vec::new();
    let mut saw_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        saw_file = true;

        if !filename.to_lowercase().ends_with(".pdf") {
            errors.push(format!("'{}': Not a PDF file, skipped.", filename));
            continue;
        }

        let content = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                errors.push(format!("'{}': Failed to read upload: {}", filename, e));
                continue;
            }
        };
        if content.is_empty() {
            errors.push(format!("'{}': Empty file, skipped.", filename));
            continue;
        }

        match index_document(&state, content.to_vec(), filename.clone()).await {
            Ok(num_chunks) => {
                total_chunks += num_chunks;
                documents_indexed += 1;
                info!("Indexed '{}': {} chunks", filename, num_chunks);
            }
            Err(e) => {
                error!("Error processing '{}': {}", filename, e.detail);
                errors.push(format!("'{}': {}", filename, e.detail));
            }
        }
    }

    if !saw_file {
        return Err(ApiError::bad_request("No files provided."));
    }

    if documents_indexed == 0 {
        let mut detail = "No documents were successfully processed.".to_string();
        if !errors.is_empty() {
            detail.push_str(&format!(" Errors: {}", errors.join("; ")));
        }
        return Err(ApiError::bad_request(detail));
    }

    let mut message = "Documents processed successfully".to_string();
    if !errors.is_empty() {
        message.push_str(&format!(" (with warnings: {})", errors.join("; ")));
    }

    Ok(Json(DocumentUploadResponse {
        message,
        documents_indexed,
        total_chunks,
    }))
}

/// Extract, chunk, embed and persist one document off the async runtime.
async fn index_document(
    state: &SharedState,
    content: Vec<u8>,
    filename: String,
) -> std::result::Result<usize, ApiError> {
    let processor = state.processor.clone();
    let store = Arc::clone(&state.store);

    tokio::task::spawn_blocking(move || {
        let chunks = processor.process(&content, &filename)?;
        if chunks.is_empty() {
            return Err(RagError::Document(
                "No text could be extracted.".to_string(),
            ));
        }
        store.add_chunks(&chunks)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Indexing task failed: {}", e)))?
    .map_err(ApiError::from)
}

async fn list_documents(
    State(state): State<SharedState>,
) -> std::result::Result<Json<DocumentListResponse>, ApiError> {
    let store = Arc::clone(&state.store);
    let documents = tokio::task::spawn_blocking(move || store.list_sources())
        .await
        .map_err(|e| ApiError::internal(format!("Listing task failed: {}", e)))??;
    Ok(Json(DocumentListResponse { documents }))
}

async fn delete_document(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> std::result::Result<Json<MessageResponse>, ApiError> {
    let store = Arc::clone(&state.store);
    let target = filename.clone();
    let found = tokio::task::spawn_blocking(move || store.delete_by_source(&target))
        .await
        .map_err(|e| ApiError::internal(format!("Delete task failed: {}", e)))??;

    if !found {
        return Err(ApiError::not_found(format!(
            "Document '{}' not found",
            filename
        )));
    }

    Ok(Json(MessageResponse {
        message: format!("Document '{}' deleted successfully", filename),
    }))
}

/// Answer a question with retrieval-augmented generation.
async fn ask_question(
    State(state): State<SharedState>,
    Json(request): Json<QuestionRequest>,
) -> std::result::Result<Json<QuestionResponse>, ApiError> {
    let question_len = request.question.chars().count();
    if question_len == 0 {
        return Err(ApiError::bad_request("Question must not be empty."));
    }
    if question_len > MAX_QUESTION_CHARS {
        return Err(ApiError::bad_request(format!(
            "Question exceeds the maximum length of {} characters.",
            MAX_QUESTION_CHARS
        )));
    }

    info!(
        "Question received: '{}'",
        request.question.chars().take(80).collect::<String>()
    );

    let store = Arc::clone(&state.store);
    let llm = Arc::clone(&state.llm);
    let question = request.question.clone();
    let provider = request.provider.map(models::ProviderChoice::as_str);

    let answer = tokio::task::spawn_blocking(move || {
        let chunks = store.query(&question, None)?;
        llm.generate_answer(&question, &chunks, provider)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Answering task failed: {}", e)))?
    .map_err(|e| {
        error!("Error answering question: {}", e);
        ApiError::internal(format!("Failed to process question: {}", e))
    })?;

    Ok(Json(QuestionResponse {
        answer: answer.answer,
        references: answer.references,
    }))
}

async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let store = Arc::clone(&state.store);
    let stats = tokio::task::spawn_blocking(move || store.stats()).await;

    match stats {
        Ok(Ok(stats)) => Json(HealthResponse {
            status: "healthy",
            collection_stats: Some(stats),
        }),
        Ok(Err(e)) => {
            warn!("Health check degraded: {}", e);
            Json(HealthResponse {
                status: "degraded",
                collection_stats: None,
            })
        }
        Err(e) => {
            warn!("Health check task failed: {}", e);
            Json(HealthResponse {
                status: "degraded",
                collection_stats: None,
            })
        }
    }
}
