//! Request handlers, one module per endpoint group.

pub mod construct;
pub mod datasets;
pub mod graph;
pub mod question;
pub mod status;
pub mod upload;
pub mod ws;

use serde::Deserialize;
use uuid::Uuid;

/// Query parameter carried by every mutating endpoint so progress events
/// reach the right websocket subscriber. A request without one gets a
/// throwaway id; its events go nowhere, which is fine.
#[derive(Debug, Deserialize)]
pub struct ClientParams {
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    format!("anon-{}", Uuid::new_v4())
}
