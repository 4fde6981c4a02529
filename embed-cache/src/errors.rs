//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for cache operations.
///
/// Note: a cache *miss* is not an error (`get` returns `Ok(None)`), and
/// neither is a corrupt entry — corruption is discarded and reported as a
/// miss so the pipeline recomputes.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Vectors and passages disagree in length at `put` time.
    #[error("entry shape mismatch: {vectors} vectors for {passages} passages")]
    ShapeMismatch { vectors: usize, passages: usize },
}
