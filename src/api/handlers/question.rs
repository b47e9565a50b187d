//! Question answering handler.
//!
//! Wires the per-request collaborators (retriever over the dataset's graph
//! artifacts, LLM-backed decomposer) and hands off to the orchestrator.
//! A dataset without a constructed graph falls back to the demo graph so
//! the endpoint stays usable out of the box.

use crate::api::handlers::ClientParams;
use crate::datasets::DEMO_DATASET;
use crate::events::ProgressEvent;
use crate::retrieval::{GraphRetriever, LlmDecomposer, Retriever};
use crate::types::{AppError, QuestionRequest, QuestionResponse, Result};
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use std::sync::Arc;
use tracing::{error, info};

#[utoipa::path(
    post,
    path = "/api/ask-question",
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Question answered", body = QuestionResponse),
        (status = 400, description = "Empty question"),
        (status = 404, description = "No constructed graph available")
    ),
    tag = "questions"
)]
pub async fn ask_question(
    State(state): State<AppState>,
    Query(params): Query<ClientParams>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::InvalidInput("Question cannot be empty".to_string()));
    }

    // Fall back to the demo artifacts when the dataset has no graph yet.
    let effective = if state.store.graph_path(&payload.dataset_name).exists() {
        payload.dataset_name.as_str()
    } else {
        DEMO_DATASET
    };
    if !state.store.graph_path(effective).exists() {
        return Err(AppError::NotFound(format!(
            "No knowledge graph constructed for dataset '{}'",
            payload.dataset_name
        )));
    }

    let llm = state.llm_factory.create();
    let retriever = Arc::new(GraphRetriever::new(
        state.store.graph_path(effective),
        state.store.chunks_path(effective),
        llm.clone(),
    ));
    retriever.build_indices().await?;

    let schema_path = state.store.resolve_schema(&payload.dataset_name).await?;
    let orchestrator = crate::orchestrator::QaOrchestrator::new(
        Arc::new(LlmDecomposer::new(llm)),
        retriever,
        state.publisher.clone(),
        state.config.retrieval.top_k,
        state.config.retrieval.agent.max_steps,
    );

    info!(
        question,
        dataset = %payload.dataset_name,
        effective_dataset = effective,
        client_id = %params.client_id,
        "question received"
    );

    let response = orchestrator
        .answer_question(
            question,
            &payload.dataset_name,
            &schema_path,
            &params.client_id,
        )
        .await
        .map_err(|e| {
            error!(question, error = %e, "question answering failed");
            state
                .publisher
                .publish(&params.client_id, ProgressEvent::error("qa", e.to_string()));
            e
        })?;

    Ok(Json(response))
}
