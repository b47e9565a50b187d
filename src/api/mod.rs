//! HTTP API handlers and routes.
//!
//! REST + websocket surface of the KGQA server, built on Axum.
//!
//! # API Endpoints
//!
//! ## Questions
//! - `POST /api/ask-question` - Run the retrieval-reasoning pipeline
//!
//! ## Datasets (`/api/datasets`)
//! - `GET /api/datasets` - List datasets with construction status
//! - `DELETE /api/datasets/{name}` - Delete a dataset and its artifacts
//! - `POST /api/datasets/{name}/schema` - Upload a custom schema
//! - `POST /api/datasets/{name}/reconstruct` - Rebuild the graph
//!
//! ## Upload / construction
//! - `POST /api/upload` - Multipart document upload
//! - `POST /api/construct-graph` - Build the knowledge graph
//!
//! ## Misc
//! - `GET /api/status` - Health check
//! - `GET /api/graph/{dataset}` - Graph visualization payload
//! - `GET /ws/{client_id}` - Progress event stream
//!
//! # Progress streaming
//!
//! Mutating endpoints accept a `client_id` query parameter; events for
//! that id are streamed to the matching websocket connection. Streaming
//! is best-effort and never affects the HTTP response.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
