//! Health check handler.

use crate::types::StatusResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Server is healthy", body = StatusResponse)
    ),
    tag = "status"
)]
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "KGQA backend is running".to_string(),
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
