//! Question decomposition via the LLM.

use crate::llm::LLMClient;
use crate::retrieval::Decomposition;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Decomposition collaborator. Any internal fault surfaces as
/// `AppError::Decomposition`; the orchestrator recovers locally.
#[async_trait]
pub trait Decomposer: Send + Sync {
    async fn decompose(&self, question: &str, schema_path: &Path) -> Result<Decomposition>;
}

/// LLM-backed decomposer: prompts the model to split the question into
/// independently retrievable sub-questions constrained by the dataset
/// schema, and parses the JSON reply tolerating markdown fences.
pub struct LlmDecomposer {
    llm: Arc<dyn LLMClient>,
}

impl LlmDecomposer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(question: &str, schema: &str) -> String {
        format!(
            r#"You are a question decomposition agent for a knowledge graph.

Graph schema (permissible node, relation and attribute types):
{schema}

Decompose the question below into independently retrievable sub-questions.
If no decomposition is warranted, echo the question as the single sub-question.

Return only valid JSON of this shape:
{{
  "sub_questions": [{{"sub-question": "..."}}],
  "involved_types": {{"nodes": [], "relations": [], "attributes": []}}
}}

Question: {question}"#
        )
    }
}

#[async_trait]
impl Decomposer for LlmDecomposer {
    async fn decompose(&self, question: &str, schema_path: &Path) -> Result<Decomposition> {
        let schema = tokio::fs::read_to_string(schema_path)
            .await
            .map_err(|e| AppError::Decomposition(format!("Cannot read schema: {}", e)))?;

        let prompt = Self::build_prompt(question, &schema);
        let response = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| AppError::Decomposition(e.to_string()))?;

        let decomposition: Decomposition = serde_json::from_str(strip_fences(&response))
            .map_err(|e| AppError::Decomposition(format!("Unparseable decomposition: {}", e)))?;

        if decomposition.sub_questions.is_empty() {
            return Err(AppError::Decomposition(
                "Decomposer returned no sub-questions".to_string(),
            ));
        }

        Ok(decomposition)
    }
}

/// Models routinely wrap JSON in markdown fences; tolerate that.
pub(crate) fn strip_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}
