//! TOML-based configuration for the KGQA server.
//!
//! All bounds the orchestrator depends on (`retrieval.top_k`,
//! `retrieval.agent.max_steps`) are typed and defaulted here and resolved
//! once at startup, so the question-answering pipeline never has to probe
//! for optional configuration at runtime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{AppError, Result};

/// Root configuration structure loaded from kgqa.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KgqaConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl KgqaConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults so the server can run without any on-disk configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            AppError::InvalidInput(format!("Invalid config {}: {}", path.display(), e))
        })
    }
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============= Filesystem Layout =============

/// Where datasets, schemas and constructed graph artifacts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_demo_dir")]
    pub demo_dir: PathBuf,

    #[serde(default = "default_graphs_dir")]
    pub graphs_dir: PathBuf,

    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: PathBuf,

    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,

    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/uploaded")
}

fn default_demo_dir() -> PathBuf {
    PathBuf::from("data/demo")
}

fn default_graphs_dir() -> PathBuf {
    PathBuf::from("output/graphs")
}

fn default_chunks_dir() -> PathBuf {
    PathBuf::from("output/chunks")
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            demo_dir: default_demo_dir(),
            graphs_dir: default_graphs_dir(),
            chunks_dir: default_chunks_dir(),
            schemas_dir: default_schemas_dir(),
            assets_dir: default_assets_dir(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_api_key_env() -> String {
    "KGQA_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Result cap passed to the retriever for every round.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_top_k() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            agent: AgentConfig::default(),
        }
    }
}

/// Bounds for the iterative reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard upper bound on IRCoT reasoning iterations per question.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_max_steps() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}
