use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{future, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use validator::Validate;

use crate::document::Document;
use crate::error::RagError;
use crate::llm::message::ConversationMessage;
use crate::llm::stream::GenerationStreamEvent;
use crate::rag::{ChatEngine, DocumentSummary, PromptComposer, RagPipeline};

/// Shared by every request. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    /// Wording used by `/query`.
    pub composer: PromptComposer,
    pub chat: Option<ChatEngine>,
    pub llama_chat: Option<ChatEngine>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentRequest {
    #[validate(length(min = 1))]
    text: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 10000))]
    query: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    enhanced_prompt: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// A [`RagError`] rendered as `{"error": ...}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(RagError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RagError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(RagError::InvalidRequest(rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError(RagError::InvalidRequest(errors.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Permits for chat answers still streaming to a client.
#[derive(Clone)]
struct GenerationSlots(Arc<Semaphore>);

/// Create and configure the API router
///
/// `max_concurrent_requests` bounds requests being handled and, separately,
/// chat answers whose body is still streaming.
pub fn create_api(state: AppState, max_concurrent_requests: usize) -> Router {
    let limit = max_concurrent_requests.max(1);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/llama-chat", post(llama_chat_handler))
        .route("/documents", post(add_document_handler).get(list_documents_handler))
        .route("/query", post(query_handler))
        .route("/health", get(health_check))
        .layer(GlobalConcurrencyLimitLayer::new(limit))
        .layer(Extension(GenerationSlots(Arc::new(Semaphore::new(limit)))))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn chat_handler(
    State(state): State<AppState>,
    Extension(slots): Extension<GenerationSlots>,
    payload: Result<Json<Vec<ConversationMessage>>, JsonRejection>,
) -> ApiResult<Response> {
    let engine = state
        .chat
        .as_ref()
        .ok_or_else(|| RagError::Config("chat provider is not configured".to_string()))?;
    stream_answer(engine, &slots, payload).await
}

async fn llama_chat_handler(
    State(state): State<AppState>,
    Extension(slots): Extension<GenerationSlots>,
    payload: Result<Json<Vec<ConversationMessage>>, JsonRejection>,
) -> ApiResult<Response> {
    let engine = state.llama_chat.as_ref().ok_or_else(|| {
        RagError::Config("OPENROUTER_API_KEY is not set, llama chat is disabled".to_string())
    })?;
    stream_answer(engine, &slots, payload).await
}

/// Stream the answer as a raw `text/plain` body.
///
/// Errors before generation starts get a JSON error response; a generation error
/// after the first byte aborts the body. A generation slot is held until the
/// body is finished or dropped.
async fn stream_answer(
    engine: &ChatEngine,
    slots: &GenerationSlots,
    payload: Result<Json<Vec<ConversationMessage>>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(messages) = payload?;
    let permit = Arc::clone(&slots.0)
        .acquire_owned()
        .await
        .map_err(|_| RagError::Config("generation slots are closed".to_string()))?;
    let relay = engine.answer(&messages).await?;

    let body = relay.filter_map(move |event| {
        let _slot = &permit;
        future::ready(match event {
            GenerationStreamEvent::Delta(text) => Some(Ok(text)),
            GenerationStreamEvent::Completed => None,
            GenerationStreamEvent::Failed(message) => {
                warn!(error = %message, "aborting chat response body");
                Some(Err(io::Error::new(io::ErrorKind::Other, message)))
            }
        })
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

async fn add_document_handler(
    State(state): State<AppState>,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let report = state
        .pipeline
        .ingest(Document::new(request.text).with_metadata(request.metadata))
        .await?;
    info!(document.id = %report.document_id, chunks = report.chunks, "document added");

    Ok(Json(MessageResponse {
        message: "Document added successfully".to_string(),
    }))
}

async fn list_documents_handler(State(state): State<AppState>) -> ApiResult<Json<DocumentsResponse>> {
    let documents = state.pipeline.list_documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let passages = state.pipeline.retrieve(&request.query).await?;
    Ok(Json(QueryResponse {
        enhanced_prompt: state.composer.augment(&request.query, &passages),
    }))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (RagError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (RagError::Config("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (RagError::Retrieval("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (RagError::embedding("openai", "x"), StatusCode::INTERNAL_SERVER_ERROR),
            (RagError::index_write("qdrant", "x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_document_request_validation() {
        let empty: DocumentRequest = serde_json::from_str(r#"{"text": ""}"#).unwrap();
        assert!(empty.validate().is_err());

        let ok: DocumentRequest =
            serde_json::from_str(r#"{"text": "Article 1.", "metadata": {"source": "upload"}}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.metadata["source"], "upload");
    }

    #[test]
    fn test_query_response_uses_camel_case() {
        let body = serde_json::to_value(QueryResponse {
            enhanced_prompt: "p".to_string(),
        })
        .unwrap();
        assert_eq!(body["enhancedPrompt"], "p");
    }
}
