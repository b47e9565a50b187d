//! LLM client trait and factory abstraction.

use crate::types::Result;
use crate::utils::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Generic LLM client trait for provider abstraction.
///
/// This is the sole reasoning-model invocation seam: the decomposer, the
/// graph builder and the IRCoT loop all go through it.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with a system prompt.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name/identifier.
    fn model_name(&self) -> &str;
}

/// Factory for LLM clients.
///
/// Handlers never construct concrete clients themselves; they ask the
/// factory held in `AppState`. Tests swap in a factory returning mocks.
pub trait LLMClientFactory: Send + Sync {
    fn create(&self) -> Arc<dyn LLMClient>;
}

/// Config-backed factory producing [`super::OpenAICompatClient`]s.
pub struct ConfigLLMFactory {
    config: LlmConfig,
}

impl ConfigLLMFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl LLMClientFactory for ConfigLLMFactory {
    fn create(&self) -> Arc<dyn LLMClient> {
        Arc::new(super::OpenAICompatClient::from_config(&self.config))
    }
}
