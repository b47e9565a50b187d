use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(crate::api::handlers::status::status))
        .route("/api/upload", post(crate::api::handlers::upload::upload))
        .route(
            "/api/construct-graph",
            post(crate::api::handlers::construct::construct_graph),
        )
        .route(
            "/api/ask-question",
            post(crate::api::handlers::question::ask_question),
        )
        .route(
            "/api/datasets",
            get(crate::api::handlers::datasets::list_datasets),
        )
        .route(
            "/api/datasets/{name}",
            axum::routing::delete(crate::api::handlers::datasets::delete_dataset),
        )
        .route(
            "/api/datasets/{name}/schema",
            post(crate::api::handlers::datasets::upload_schema),
        )
        .route(
            "/api/datasets/{name}/reconstruct",
            post(crate::api::handlers::construct::reconstruct),
        )
        .route(
            "/api/graph/{dataset}",
            get(crate::api::handlers::graph::get_graph),
        )
        .route("/ws/{client_id}", get(crate::api::handlers::ws::ws_handler))
}
