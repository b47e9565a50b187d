//! Core types (requests, responses, errors).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionRequest {
    pub question: String,
    pub dataset_name: String,
}

/// Final payload of a question-answering run: the answer plus the full
/// retrieval/reasoning trace and its visualization projections.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionResponse {
    pub answer: String,
    pub sub_questions: Vec<serde_json::Value>,
    /// Deduplicated triples, capped to the first 20 in insertion order.
    pub retrieved_triples: Vec<String>,
    /// Chunk contents, capped to 10.
    pub retrieved_chunks: Vec<String>,
    pub reasoning_steps: Vec<crate::orchestrator::trace::ReasoningStep>,
    pub visualization_data: VisualizationData,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VisualizationData {
    pub subqueries: serde_json::Value,
    pub knowledge_graph: serde_json::Value,
    pub reasoning_flow: serde_json::Value,
    pub retrieval_details: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GraphConstructionRequest {
    pub dataset_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GraphConstructionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub has_custom_schema: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetListResponse {
    pub datasets: Vec<DatasetInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub message: String,
    pub status: String,
    pub version: String,
}

// ============= Error Types =============

/// Application error taxonomy.
///
/// `Decomposition`, `Retrieval` and `Llm` have local recovery paths inside
/// the orchestrator and normally never surface to a client; anything that
/// escapes those paths maps to `Internal`. Publish failures are not errors
/// at all; the progress publisher swallows them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Decomposition(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Retrieval(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Llm(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (axum::http::StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
