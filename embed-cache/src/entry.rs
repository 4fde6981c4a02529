//! Cache entry and metadata models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata record persisted next to the vectors and passages of one entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cache_key: String,
    pub embedder: String,
    pub chunker: String,
    #[serde(default)]
    pub chunker_params: BTreeMap<String, String>,
    pub passage_count: usize,
    pub embedding_dimension: usize,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

/// A fully-loaded cache entry.
///
/// `P` is the caller's passage type; the cache only requires it to be
/// serde-serializable one-per-line. Invariant on load:
/// `vectors.len() == passages.len()` — a mismatch is corruption and the
/// entry is discarded as a miss.
#[derive(Debug)]
pub struct CacheEntry<P> {
    pub passages: Vec<P>,
    pub vectors: Vec<Vec<f32>>,
    pub metadata: CacheMetadata,
}
