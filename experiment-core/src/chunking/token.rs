//! Token-count chunking over a fixed HuggingFace tokenizer.
//!
//! Same contract as the character-based strategies, but `chunk_size` and
//! `chunk_overlap` are measured in tokens of the configured tokenizer file.
//! The tokenizer is part of the strategy identity: a different tokenizer
//! produces different passages, so its name participates in cache-key
//! derivation.

use std::path::{Path, PathBuf};

use tokenizers::Tokenizer;
use tracing::warn;

use crate::chunking::{Chunker, window_bounds};
use crate::errors::{ExperimentError, Result};
use crate::record::{Document, Passage};

/// Sliding token window of `chunk_size` tokens advancing by
/// `chunk_size - chunk_overlap`.
pub struct TokenChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Tokenizer,
    tokenizer_name: String,
}

impl TokenChunker {
    /// Loads the tokenizer from `tokenizer_path` (a `tokenizer.json` file).
    ///
    /// # Errors
    /// Returns a config error unless `chunk_overlap < chunk_size` and the
    /// tokenizer file loads.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        tokenizer_path: impl AsRef<Path>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ExperimentError::config(
                "chunker.chunk_size",
                "must be greater than 0",
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ExperimentError::config(
                "chunker.chunk_overlap",
                format!("overlap {chunk_overlap} must be smaller than chunk_size {chunk_size}"),
            ));
        }

        let path: PathBuf = tokenizer_path.as_ref().to_path_buf();
        let tokenizer = Tokenizer::from_file(&path).map_err(|e| {
            ExperimentError::config(
                "chunker.params.tokenizer_path",
                format!("load tokenizer {}: {e}", path.display()),
            )
        })?;
        let tokenizer_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tokenizer".into());

        Ok(Self {
            chunk_size,
            chunk_overlap,
            tokenizer,
            tokenizer_name,
        })
    }
}

impl Chunker for TokenChunker {
    fn id(&self) -> &'static str {
        "token"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("chunk_size".into(), self.chunk_size.to_string()),
            ("chunk_overlap".into(), self.chunk_overlap.to_string()),
            ("tokenizer".into(), self.tokenizer_name.clone()),
        ]
    }

    fn split(&self, doc: &Document) -> Vec<Passage> {
        let encoding = match self.tokenizer.encode(doc.text.as_str(), false) {
            Ok(enc) => enc,
            Err(e) => {
                warn!("tokenizer failed on document {}: {e}; keeping it whole", doc.id);
                return vec![Passage {
                    doc_id: doc.id.clone(),
                    index: 0,
                    text: doc.text.clone(),
                }];
            }
        };

        let ids = encoding.get_ids();
        let mut out = Vec::new();
        for (start, end) in window_bounds(ids.len(), self.chunk_size, self.chunk_overlap) {
            match self.tokenizer.decode(&ids[start..end], true) {
                Ok(text) if !text.trim().is_empty() => {
                    out.push(Passage {
                        doc_id: doc.id.clone(),
                        index: out.len(),
                        text,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "tokenizer decode failed for {} window {start}..{end}: {e}",
                        doc.id
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tokenizer_path() -> PathBuf {
        std::env::var("TOKENIZER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models/tokenizer.json"))
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = TokenChunker::new(100, 100, tokenizer_path()).err().unwrap();
        assert!(matches!(err, ExperimentError::Config { .. }));
    }

    #[test]
    fn missing_tokenizer_file_is_a_config_error() {
        let err = TokenChunker::new(100, 10, "does/not/exist/tokenizer.json").err().unwrap();
        assert!(matches!(err, ExperimentError::Config { ref field, .. }
            if field == "chunker.params.tokenizer_path"));
    }

    #[test]
    fn token_windows_are_deterministic() {
        let path = tokenizer_path();
        if !path.exists() {
            eprintln!("Skipping: tokenizer not found");
            return;
        }
        let c = TokenChunker::new(32, 8, &path).unwrap();
        let doc = Document {
            id: "d1".into(),
            text: "the quick brown fox jumps over the lazy dog ".repeat(30),
            extra: BTreeMap::new(),
        };
        let a = c.split(&doc);
        let b = c.split(&doc);
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
