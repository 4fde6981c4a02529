//! Point construction helpers: stable ids and compact payloads.

use qdrant_client::Payload;
use qdrant_client::qdrant::PointStruct;
use serde_json::json;
use uuid::Uuid;

/// Deterministic UUIDv5 for a passage, derived from its document id and
/// position. Re-indexing the same passage therefore overwrites the point
/// instead of duplicating it.
pub fn stable_point_id(doc_id: &str, passage_index: usize) -> Uuid {
    let seed = format!("{doc_id}#{passage_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())
}

/// Builds a Qdrant point for one passage.
///
/// Payload keys are the canonical retrieval fields: `doc_id`,
/// `passage_index`, and `text`.
pub fn build_point(
    doc_id: &str,
    passage_index: usize,
    text: &str,
    vector: Vec<f32>,
) -> PointStruct {
    let mut payload: Payload = Default::default();
    payload.insert("doc_id".to_string(), json!(doc_id));
    payload.insert("passage_index".to_string(), json!(passage_index as i64));
    payload.insert("text".to_string(), json!(text));

    PointStruct::new(
        stable_point_id(doc_id, passage_index).to_string(),
        vector,
        payload,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable() {
        let a = stable_point_id("doc-1", 0);
        let b = stable_point_id("doc-1", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn point_ids_differ_per_passage() {
        assert_ne!(stable_point_id("doc-1", 0), stable_point_id("doc-1", 1));
        assert_ne!(stable_point_id("doc-1", 0), stable_point_id("doc-2", 0));
    }
}
