//! Deterministic cache-key derivation.
//!
//! A key is a pure function of the embedder identifier plus the chunker
//! identifier and its output-affecting parameters. It never depends on
//! document content, so a freshly started process derives the same key for
//! the same strategy configuration and hits the cache immediately.

use std::fmt;

/// Content-address of one `(embedder, chunker-config)` combination.
///
/// Keys are readable sanitized strings (e.g.
/// `text_embedding_3_small_recursive_1000_200`) so operator maintenance
/// commands can list and reason about them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives a key from the embedder identifier, chunker identifier and
    /// the chunker's output-affecting parameters in declaration order.
    pub fn derive(embedder_id: &str, chunker_id: &str, params: &[(String, String)]) -> Self {
        let mut parts = vec![sanitize(embedder_id), sanitize(chunker_id)];
        for (_, value) in params {
            let v = sanitize(value);
            if !v.is_empty() {
                parts.push(v);
            }
        }
        CacheKey(parts.join("_"))
    }

    /// Wraps an already-derived key (e.g. a directory name found on disk).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CacheKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replaces path-hostile characters so keys double as directory names.
fn sanitize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
