//! Fixed-size sliding-window chunking, measured in characters.

use crate::chunking::{Chunker, window_bounds};
use crate::errors::{ExperimentError, Result};
use crate::record::{Document, Passage};

/// Sliding window of `chunk_size` characters advancing by
/// `chunk_size - chunk_overlap`.
#[derive(Debug)]
pub struct FixedChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedChunker {
    /// # Errors
    /// Returns a config error unless `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
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
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Chunker for FixedChunker {
    fn id(&self) -> &'static str {
        "fixed"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("chunk_size".into(), self.chunk_size.to_string()),
            ("chunk_overlap".into(), self.chunk_overlap.to_string()),
        ]
    }

    fn split(&self, doc: &Document) -> Vec<Passage> {
        let chars: Vec<char> = doc.text.chars().collect();
        let mut out = Vec::new();
        for (start, end) in window_bounds(chars.len(), self.chunk_size, self.chunk_overlap) {
            let text: String = chars[start..end].iter().collect();
            if text.trim().is_empty() {
                continue;
            }
            out.push(Passage {
                doc_id: doc.id.clone(),
                index: out.len(),
                text,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn doc(text: &str) -> Document {
        Document {
            id: "d1".into(),
            text: text.into(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(FixedChunker::new(100, 100).is_err());
        assert!(FixedChunker::new(100, 150).is_err());
        assert!(FixedChunker::new(100, 99).is_ok());
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let c = FixedChunker::new(10, 3).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        let passages = c.split(&doc(text));
        assert_eq!(passages[0].text, "abcdefghij");
        assert_eq!(passages[1].text, "hijklmnopq");
        assert!(passages.iter().all(|p| p.text.chars().count() <= 10));
    }

    #[test]
    fn splitting_is_deterministic() {
        let c = FixedChunker::new(10, 3).unwrap();
        let d = doc("the quick brown fox jumps over the lazy dog");
        assert_eq!(c.split(&d), c.split(&d));
    }

    #[test]
    fn short_document_is_one_passage() {
        let c = FixedChunker::new(100, 10).unwrap();
        let passages = c.split(&doc("short"));
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "short");
    }
}
