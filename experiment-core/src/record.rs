//! Core data models used by the harness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A source document: raw text plus a stable identifier.
///
/// Immutable once loaded; chunkers read it, nothing mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

/// A contiguous span of a document's text produced by a chunking strategy.
///
/// `index` is insertion order within the owning document; embedding vectors
/// are ordered 1:1 with passages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub doc_id: String,
    pub index: usize,
    pub text: String,
}

/// One evaluation query with its ground truth and requester profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: String,
    pub text: String,
    /// Raw user-profile object; identifies the requesting persona.
    /// Used for stratified sampling, not for retrieval.
    #[serde(default)]
    pub profile: Value,
    /// Relevant document ids for this query.
    #[serde(default)]
    pub ground_truth: Vec<String>,
}

impl QueryRecord {
    /// Stable 8-hex-char identity of the profile object.
    ///
    /// serde_json serializes maps with sorted keys, so the digest input is
    /// canonical regardless of the order keys appeared in on disk.
    pub fn profile_key(&self) -> String {
        let canonical = self.profile.to_string();
        let mut h = Sha256::new();
        h.update(canonical.as_bytes());
        let hex = format!("{:x}", h.finalize());
        hex[..8].to_string()
    }
}

/// A single ranked retrieval candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedHit {
    pub doc_id: String,
    pub score: f32,
    /// Passage text, carried for response generation; not persisted in
    /// detailed records.
    #[serde(skip)]
    pub text: Option<String>,
}

/// Per-query retrieval outcome: either a ranked list or an error marker.
///
/// Failed queries stay in the outcome list (the run is partial-failure
/// tolerant) but are excluded from metric aggregation.
#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub query_id: String,
    pub hits: Vec<RankedHit>,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn ok(query_id: impl Into<String>, hits: Vec<RankedHit>) -> Self {
        Self {
            query_id: query_id.into(),
            hits,
            error: None,
        }
    }

    pub fn failed(query_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            hits: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn retrieved_ids(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.doc_id.clone()).collect()
    }
}

/// One query selected for qualitative (judge-based) evaluation, together
/// with its generated response and judge scores once produced.
#[derive(Clone, Debug)]
pub struct SampledQuery {
    pub record: QueryRecord,
    pub response: Option<String>,
    pub judge_scores: Option<BTreeMap<String, u8>>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_key_ignores_key_order() {
        let a = QueryRecord {
            query_id: "1".into(),
            text: "q".into(),
            profile: json!({"major": "cs", "interest": ["backend"]}),
            ground_truth: vec![],
        };
        let b = QueryRecord {
            query_id: "2".into(),
            text: "q2".into(),
            profile: serde_json::from_str(r#"{"interest": ["backend"], "major": "cs"}"#).unwrap(),
            ground_truth: vec![],
        };
        assert_eq!(a.profile_key(), b.profile_key());
        assert_eq!(a.profile_key().len(), 8);
    }

    #[test]
    fn different_profiles_get_different_keys() {
        let mut q = QueryRecord {
            query_id: "1".into(),
            text: "q".into(),
            profile: json!({"major": "cs"}),
            ground_truth: vec![],
        };
        let a = q.profile_key();
        q.profile = json!({"major": "bio"});
        assert_ne!(a, q.profile_key());
    }
}
