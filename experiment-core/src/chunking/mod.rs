//! Chunking strategies: document → ordered passages.
//!
//! All strategies are deterministic: the same document with the same
//! parameters yields the identical passage sequence on every run. Cache-key
//! derivation depends on this — see [`Chunker::params`].

mod fixed;
mod no_chunk;
mod recursive;
mod token;

pub use fixed::FixedChunker;
pub use no_chunk::NoChunker;
pub use recursive::RecursiveChunker;
pub use token::TokenChunker;

use crate::record::{Document, Passage};

/// Capability contract of a chunking strategy.
pub trait Chunker: Send + Sync {
    /// Strategy identifier as registered with the factory.
    fn id(&self) -> &'static str;

    /// Output-affecting parameters in declaration order.
    ///
    /// Together with [`Chunker::id`] and the embedder identifier these feed
    /// cache-key derivation, so every parameter that changes the produced
    /// passages must appear here.
    fn params(&self) -> Vec<(String, String)>;

    /// Splits one document into ordered passages.
    fn split(&self, doc: &Document) -> Vec<Passage>;
}

/// Splits every document in order, assigning per-document passage indices.
pub fn split_documents(chunker: &dyn Chunker, docs: &[Document]) -> Vec<Passage> {
    let mut out = Vec::new();
    for doc in docs {
        out.extend(chunker.split(doc));
    }
    out
}

/// Window bounds over `n` items: `size`-wide windows advancing by
/// `size - overlap`, with saturation so progress is always made.
///
/// Shared by the character- and token-based strategies.
pub(crate) fn window_bounds(n: usize, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    if n == 0 || size == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(n);
        out.push((start, end));
        if end == n {
            break;
        }
        start += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_everything_with_overlap() {
        let w = window_bounds(10, 4, 1);
        assert_eq!(w, vec![(0, 4), (3, 7), (6, 10)]);
    }

    #[test]
    fn single_window_when_input_fits() {
        assert_eq!(window_bounds(3, 10, 2), vec![(0, 3)]);
    }

    #[test]
    fn empty_input_yields_no_windows() {
        assert!(window_bounds(0, 4, 1).is_empty());
    }

    #[test]
    fn degenerate_overlap_still_progresses() {
        // overlap == size would stall without the step floor of 1.
        let w = window_bounds(5, 2, 2);
        assert_eq!(w.first(), Some(&(0, 2)));
        assert_eq!(w.last(), Some(&(3, 5)));
        assert!(w.len() <= 5);
    }
}
