//! Retrieval collaborators: question decomposition and graph/chunk search.
//!
//! The orchestrator consumes both through narrow traits. The rest of the
//! crate depends on the contract and the failure semantics, not on the
//! ranking quality of the concrete implementations here.

/// Question decomposition collaborator.
pub mod decomposer;
/// Graph/vector retrieval collaborator.
pub mod retriever;

pub use decomposer::{Decomposer, LlmDecomposer};
pub use retriever::{GraphRetriever, Retriever};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema-hint set used to bias retrieval. May be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvolvedTypes {
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub relations: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl InvolvedTypes {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relations.is_empty() && self.attributes.is_empty()
    }
}

/// One decomposed sub-question. Ordering is significant; duplicates are
/// permitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuestion {
    #[serde(rename = "sub-question")]
    pub text: String,
}

impl SubQuestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Output of the decomposition stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decomposition {
    #[serde(default)]
    pub sub_questions: Vec<SubQuestion>,
    #[serde(default)]
    pub involved_types: InvolvedTypes,
}

impl Decomposition {
    /// The degraded decomposition used when the decomposer fails: one
    /// pseudo-sub-question echoing the original question, empty hints.
    pub fn fallback(question: &str) -> Self {
        Self {
            sub_questions: vec![SubQuestion::new(question)],
            involved_types: InvolvedTypes::default(),
        }
    }
}

/// Chunk text as returned by a retriever: either keyed by chunk id, or a
/// sequence positionally aligned with `chunk_ids` (possibly shorter).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkContents {
    Mapped(HashMap<String, String>),
    Aligned(Vec<String>),
}

impl Default for ChunkContents {
    fn default() -> Self {
        ChunkContents::Aligned(Vec::new())
    }
}

/// One round of retrieval results. Triples are canonical string-encoded
/// `(subject, relation, object)` facts; duplicates across rounds are
/// expected and collapsed by the aggregator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub triples: Vec<String>,
    #[serde(default)]
    pub chunk_ids: Vec<String>,
    #[serde(default)]
    pub chunk_contents: ChunkContents,
}
