//! Separator-aware recursive splitting with overlap.
//!
//! Oversized spans are subdivided until every passage fits `chunk_size`
//! characters, preferring to break after a paragraph, then a line, then a
//! word boundary before falling back to a hard cut. Consecutive passages
//! overlap by `chunk_overlap` characters.

use crate::chunking::Chunker;
use crate::errors::{ExperimentError, Result};
use crate::record::{Document, Passage};

/// Separator priority, most preferred first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Recursive character splitter.
#[derive(Debug)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
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

    fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        if n == 0 {
            return Vec::new();
        }
        if n <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut out = Vec::new();
        let mut start = 0usize;
        while start < n {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                self.break_point(&chars, start, hard_end)
            };
            let piece: String = chars[start..end].iter().collect();
            if !piece.trim().is_empty() {
                out.push(piece);
            }
            if end == n {
                break;
            }
            start = end - self.chunk_overlap;
        }
        out
    }

    /// Best break position in `(start, hard_end]`, scanning backward for the
    /// highest-priority separator. A break must leave more than
    /// `chunk_overlap` characters in the current passage so the next window
    /// always advances.
    fn break_point(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let min_end = start + self.chunk_overlap + 1;
        for sep in SEPARATORS {
            let sep_chars: Vec<char> = sep.chars().collect();
            let sep_len = sep_chars.len();
            let mut end = hard_end;
            while end >= min_end && end >= sep_len {
                if chars[end - sep_len..end] == sep_chars[..] {
                    return end;
                }
                end -= 1;
            }
        }
        hard_end
    }
}

impl Chunker for RecursiveChunker {
    fn id(&self) -> &'static str {
        "recursive"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("chunk_size".into(), self.chunk_size.to_string()),
            ("chunk_overlap".into(), self.chunk_overlap.to_string()),
        ]
    }

    fn split(&self, doc: &Document) -> Vec<Passage> {
        self.split_text(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Passage {
                doc_id: doc.id.clone(),
                index,
                text,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn doc(text: String) -> Document {
        Document {
            id: "D1".into(),
            text,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveChunker::new(500, 500).is_err());
        assert!(RecursiveChunker::new(500, 600).is_err());
        assert!(RecursiveChunker::new(500, 100).is_ok());
    }

    #[test]
    fn six_hundred_chars_make_two_overlapping_passages() {
        // 120 x "word " = 600 characters.
        let text = "word ".repeat(120);
        assert_eq!(text.chars().count(), 600);

        let c = RecursiveChunker::new(500, 100).unwrap();
        let passages = c.split(&doc(text));
        assert_eq!(passages.len(), 2);

        // The second passage starts 100 characters before the first one ends.
        let first: Vec<char> = passages[0].text.chars().collect();
        let second: Vec<char> = passages[1].text.chars().collect();
        let tail: String = first[first.len() - 100..].iter().collect();
        let head: String = second[..100].iter().collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn all_passages_fit_chunk_size() {
        let text = "lorem ipsum dolor sit amet ".repeat(100);
        let c = RecursiveChunker::new(200, 40).unwrap();
        for p in c.split(&doc(text)) {
            assert!(p.text.chars().count() <= 200);
        }
    }

    #[test]
    fn prefers_line_break_over_hard_cut() {
        let text = format!("{}\n{}", "a".repeat(450), "b".repeat(300));
        let c = RecursiveChunker::new(500, 50).unwrap();
        let passages = c.split(&doc(text));
        // First passage ends right after the newline, not at char 500.
        assert_eq!(passages[0].text.chars().count(), 451);
        assert!(passages[0].text.ends_with('\n'));
    }

    #[test]
    fn rechunking_yields_identical_sequences() {
        let text = "pack my box with five dozen liquor jugs\n".repeat(40);
        let c = RecursiveChunker::new(300, 60).unwrap();
        let d = doc(text);
        assert_eq!(c.split(&d), c.split(&d));
    }

    #[test]
    fn short_document_is_one_passage() {
        let c = RecursiveChunker::new(500, 100).unwrap();
        let passages = c.split(&doc("tiny".into()));
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "tiny");
    }

    #[test]
    fn passage_indices_are_insertion_order() {
        let text = "word ".repeat(300);
        let c = RecursiveChunker::new(200, 50).unwrap();
        let passages = c.split(&doc(text));
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.index, i);
        }
    }
}
