//! Graph construction handlers.

use crate::api::handlers::ClientParams;
use crate::events::ProgressEvent;
use crate::types::{AppError, GraphConstructionRequest, GraphConstructionResponse, Result};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

async fn run_build(
    state: &AppState,
    dataset: &str,
    client_id: &str,
) -> Result<GraphConstructionResponse> {
    let Some(builder) = state.builder.as_ref() else {
        return Err(AppError::Unavailable(
            "Graph construction backend is not configured".to_string(),
        ));
    };

    let corpus_path = state.store.corpus_path(dataset);
    if !corpus_path.exists() {
        return Err(AppError::NotFound(format!(
            "No corpus found for dataset '{}'",
            dataset
        )));
    }

    // Stale artifacts from a previous build would otherwise shadow the new
    // graph for readers racing the build.
    state.store.clear_artifacts(dataset).await;
    let schema_path = state.store.resolve_schema(dataset).await?;

    state.publisher.send_progress(
        client_id,
        "construction",
        5,
        &format!("Starting graph construction for '{}'", dataset),
    );

    let summary = builder
        .build(
            dataset,
            &corpus_path,
            &schema_path,
            &state.store.graph_path(dataset),
            &state.store.chunks_path(dataset),
            &state.publisher,
            client_id,
        )
        .await
        .map_err(|e| {
            error!(dataset, error = %e, "graph construction failed");
            state.publisher.publish(
                client_id,
                ProgressEvent::error("construction", e.to_string()),
            );
            e
        })?;

    state.publisher.publish(
        client_id,
        ProgressEvent::complete(
            "construction",
            format!(
                "Graph constructed: {} triples from {} chunks",
                summary.triples, summary.chunks
            ),
        ),
    );

    info!(dataset, triples = summary.triples, chunks = summary.chunks, "graph ready");

    Ok(GraphConstructionResponse {
        success: true,
        message: format!("Knowledge graph constructed for '{}'", dataset),
        graph_data: Some(json!({
            "triples": summary.triples,
            "chunks": summary.chunks
        })),
    })
}

#[utoipa::path(
    post,
    path = "/api/construct-graph",
    request_body = GraphConstructionRequest,
    responses(
        (status = 200, description = "Graph constructed", body = GraphConstructionResponse),
        (status = 404, description = "Dataset has no corpus"),
        (status = 503, description = "No construction backend configured")
    ),
    tag = "construction"
)]
pub async fn construct_graph(
    State(state): State<AppState>,
    Query(params): Query<ClientParams>,
    Json(payload): Json<GraphConstructionRequest>,
) -> Result<Json<GraphConstructionResponse>> {
    run_build(&state, &payload.dataset_name, &params.client_id)
        .await
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/api/datasets/{name}/reconstruct",
    params(("name" = String, Path, description = "Dataset name")),
    responses(
        (status = 200, description = "Graph reconstructed", body = GraphConstructionResponse),
        (status = 404, description = "Dataset has no corpus"),
        (status = 503, description = "No construction backend configured")
    ),
    tag = "construction"
)]
pub async fn reconstruct(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ClientParams>,
) -> Result<Json<GraphConstructionResponse>> {
    run_build(&state, &name, &params.client_id).await.map(Json)
}
