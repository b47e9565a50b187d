//! Dataset listing, deletion and schema upload.

use crate::types::{DatasetListResponse, Result};
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

#[utoipa::path(
    get,
    path = "/api/datasets",
    responses(
        (status = 200, description = "Datasets listed", body = DatasetListResponse)
    ),
    tag = "datasets"
)]
pub async fn list_datasets(State(state): State<AppState>) -> Result<Json<DatasetListResponse>> {
    let datasets = state.store.list_datasets().await?;
    Ok(Json(DatasetListResponse { datasets }))
}

#[utoipa::path(
    delete,
    path = "/api/datasets/{name}",
    params(("name" = String, Path, description = "Dataset name")),
    responses(
        (status = 200, description = "Dataset deleted"),
        (status = 400, description = "Demo dataset cannot be deleted")
    ),
    tag = "datasets"
)]
pub async fn delete_dataset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let deleted = state.store.delete_dataset(&name).await?;
    info!(dataset = %name, removed = deleted.len(), "dataset deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("Dataset '{}' deleted", name),
        "deleted": deleted
    })))
}

#[utoipa::path(
    post,
    path = "/api/datasets/{name}/schema",
    params(("name" = String, Path, description = "Dataset name")),
    responses(
        (status = 200, description = "Schema saved"),
        (status = 400, description = "Demo dataset or non-object schema")
    ),
    tag = "datasets"
)]
pub async fn upload_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(schema): Json<Value>,
) -> Result<Json<Value>> {
    state.store.save_schema(&name, &schema).await?;
    info!(dataset = %name, "custom schema saved");
    Ok(Json(json!({
        "success": true,
        "message": format!("Custom schema saved for '{}'", name)
    })))
}
