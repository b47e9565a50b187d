//! KGQA server library.
//!
//! An agentic knowledge-graph question-answering backend: documents are
//! uploaded and turned into a knowledge graph, and questions are answered
//! through iterative retrieval and reasoning (decompose, retrieve per
//! sub-question, then an IRCoT refinement loop), with progress streamed to
//! observing websocket clients along the way.
//!
//! # Architecture
//!
//! - [`orchestrator`] - the question-answering pipeline (the core)
//! - [`retrieval`] - decomposition and graph retrieval collaborators
//! - [`construction`] - LLM-backed knowledge graph construction
//! - [`datasets`] - dataset, schema and artifact file management
//! - [`events`] - best-effort progress streaming
//! - [`llm`] - reasoning-model client abstraction
//! - [`viz`] - graph-file to chart-format conversion
//! - [`api`] - HTTP/websocket surface (axum)

pub mod api;
pub mod construction;
pub mod datasets;
pub mod events;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod types;
pub mod utils;
pub mod viz;

use std::sync::Arc;

use construction::GraphBuilder;
use datasets::{DatasetStore, DocumentExtractor};
use events::ProgressPublisher;
use llm::LLMClientFactory;
use utils::config::KgqaConfig;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KgqaConfig>,
    pub publisher: Arc<ProgressPublisher>,
    pub llm_factory: Arc<dyn LLMClientFactory>,
    pub store: DatasetStore,
    /// Graph construction backend. `None` means construction endpoints
    /// answer 503 while question answering keeps working.
    pub builder: Option<Arc<dyn GraphBuilder>>,
    /// Non-text document extraction backend. `None` degrades such
    /// uploads to empty text instead of failing them.
    pub extractor: Option<Arc<dyn DocumentExtractor>>,
}

impl AppState {
    /// Standard production wiring: config-backed LLM factory and the
    /// LLM-backed graph builder, no document extractor.
    pub fn new(config: KgqaConfig) -> Self {
        let llm_factory: Arc<dyn LLMClientFactory> =
            Arc::new(llm::ConfigLLMFactory::new(config.llm.clone()));
        let builder: Arc<dyn GraphBuilder> =
            Arc::new(construction::LlmGraphBuilder::new(llm_factory.create()));
        Self {
            store: DatasetStore::new(config.paths.clone()),
            config: Arc::new(config),
            publisher: Arc::new(ProgressPublisher::new()),
            llm_factory,
            builder: Some(builder),
            extractor: None,
        }
    }
}
