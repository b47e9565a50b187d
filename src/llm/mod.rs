//! LLM client abstractions.
//!
//! The reasoning model is an external collaborator: everything in this
//! crate talks to it through the [`LLMClient`] trait, and handlers obtain
//! clients through a [`LLMClientFactory`] so tests can inject scripted
//! implementations.

/// Client trait and factory.
pub mod client;
/// OpenAI-compatible chat completions client.
pub mod openai;

pub use client::{ConfigLLMFactory, LLMClient, LLMClientFactory};
pub use openai::OpenAICompatClient;
