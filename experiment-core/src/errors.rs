//! Unified error types for the crate.
//!
//! The taxonomy mirrors how failures are handled at run time:
//! configuration problems ([`ExperimentError::Config`],
//! [`ExperimentError::UnknownStrategy`]) abort before any remote call;
//! per-item remote failures are recorded in outcome records by the pipeline
//! and never surface as this type; [`ExperimentError::Fatal`] aborts the
//! run with no partial report.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type Result<T> = std::result::Result<T, ExperimentError>;

/// Top-level error for experiment-core operations.
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Invalid configuration value, surfaced with the offending field.
    #[error("config error in `{field}`: {reason}")]
    Config { field: String, reason: String },

    /// No registered implementation matches the requested strategy name.
    #[error("unknown {role} strategy `{name}`")]
    UnknownStrategy { role: &'static str, name: String },

    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Embedding cache failure (not a miss — misses are `Ok(None)`).
    #[error("cache error: {0}")]
    Cache(#[from] embed_cache::CacheError),

    /// LLM provider failure (embedding, generation, or judge call).
    #[error("llm error: {0}")]
    Llm(#[from] llm_service::LlmError),

    /// Vector-store failure.
    #[error("store error: {0}")]
    Store(#[from] vector_store::StoreError),

    /// Unrecoverable run-level failure (unreachable source, empty inputs).
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ExperimentError {
    /// Shorthand for a configuration error on a named field.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ExperimentError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
