//! Graph visualization handler.

use crate::types::Result;
use crate::viz;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

#[utoipa::path(
    get,
    path = "/api/graph/{dataset}",
    params(("dataset" = String, Path, description = "Dataset name")),
    responses(
        (status = 200, description = "Visualization payload")
    ),
    tag = "graphs"
)]
pub async fn get_graph(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Json<Value>> {
    // A dataset without a graph still renders something: placeholder data
    // keeps the frontend chart alive before first construction.
    let Some(path) = state.store.resolve_graph(&dataset) else {
        return Ok(Json(viz::sample_visualization()));
    };
    let raw = tokio::fs::read_to_string(&path).await?;
    let graph: Value = serde_json::from_str(&raw)?;
    Ok(Json(viz::prepare_graph_visualization(&graph)))
}
