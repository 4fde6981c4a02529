//! Whole-document passthrough.

use crate::chunking::Chunker;
use crate::record::{Document, Passage};

/// Returns the whole document as one passage. Parameterless.
#[derive(Debug, Default)]
pub struct NoChunker;

impl Chunker for NoChunker {
    fn id(&self) -> &'static str {
        "no_chunk"
    }

    fn params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn split(&self, doc: &Document) -> Vec<Passage> {
        vec![Passage {
            doc_id: doc.id.clone(),
            index: 0,
            text: doc.text.clone(),
        }]
    }
}
