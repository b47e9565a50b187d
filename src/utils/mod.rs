//! Configuration utilities.

/// TOML-based server configuration.
pub mod config;
