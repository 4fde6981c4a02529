//! Vector-store facade: experiment indexing + similarity search over Qdrant.
//!
//! This crate provides a clean API to:
//! - Create or recreate the experiment collection for a given vector space
//! - Upsert (passage, vector) batches with stable point ids
//! - Run top-k similarity search with an optional score threshold
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules.

mod config;
mod errors;
mod facade;
mod points;

pub use config::{DistanceKind, StoreConfig, VectorSpace};
pub use errors::StoreError;
pub use points::{build_point, stable_point_id};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, trace};

/// A single search hit mapped back to harness terms.
#[derive(Clone, Debug)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f32,
    /// Indexed passage text from the payload, when stored.
    pub text: Option<String>,
}

/// High-level facade that wires configuration and the Qdrant client.
///
/// This is the single entry point recommended for harness code.
pub struct VectorStore {
    cfg: StoreConfig,
    client: facade::QdrantFacade,
}

impl VectorStore {
    /// Constructs a new store from the given configuration.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if the client initialization fails.
    pub fn new(cfg: StoreConfig) -> Result<Self, StoreError> {
        trace!("VectorStore::new collection={}", cfg.collection);
        let client = facade::QdrantFacade::new(&cfg)?;
        Ok(Self { cfg, client })
    }

    /// Drops and recreates the experiment collection for `dim`-sized vectors.
    ///
    /// # Errors
    /// Returns `StoreError::Qdrant` on client failures.
    pub async fn reset_collection(&self, dim: usize) -> Result<(), StoreError> {
        debug!("VectorStore::reset_collection dim={dim}");
        self.client
            .recreate_collection(&VectorSpace {
                size: dim,
                distance: self.cfg.distance,
            })
            .await
    }

    /// Upserts passages with their vectors in `upsert_batch`-sized groups.
    ///
    /// `items` are `(doc_id, passage_index, text)` triples ordered 1:1 with
    /// `vectors`. Vector dimensionality is checked against `dim`.
    ///
    /// # Errors
    /// Returns `StoreError::VectorSizeMismatch` on a dimension mismatch and
    /// `StoreError::Qdrant` on client failures.
    pub async fn index(
        &self,
        items: &[(String, usize, String)],
        vectors: &[Vec<f32>],
        dim: usize,
    ) -> Result<u64, StoreError> {
        if items.len() != vectors.len() {
            return Err(StoreError::VectorSizeMismatch {
                got: vectors.len(),
                want: items.len(),
            });
        }

        let batch_size = self.cfg.upsert_batch.max(1);
        let total_batches = items.len().div_ceil(batch_size);
        let pb = ProgressBar::new(total_batches as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("##-"),
        );

        let mut total: u64 = 0;
        for (chunk, vecs) in items
            .chunks(batch_size)
            .zip(vectors.chunks(batch_size))
        {
            let mut points = Vec::with_capacity(chunk.len());
            for ((doc_id, idx, text), v) in chunk.iter().zip(vecs.iter()) {
                if v.len() != dim {
                    return Err(StoreError::VectorSizeMismatch {
                        got: v.len(),
                        want: dim,
                    });
                }
                points.push(points::build_point(doc_id, *idx, text, v.clone()));
            }
            total += self.client.upsert_points(points).await?;
            pb.inc(1);
        }

        pb.finish_and_clear();
        debug!("VectorStore::index upserted {total} points");
        Ok(total)
    }

    /// Runs a top-k similarity search and maps hits back to document ids.
    ///
    /// Hits are returned by descending score; candidates below
    /// `score_threshold` (when set) are excluded.
    ///
    /// # Errors
    /// Returns `StoreError::Qdrant` if search fails.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredDoc>, StoreError> {
        trace!("VectorStore::search top_k={top_k}");
        let hits = self.client.search(query_vector, top_k, score_threshold).await?;

        let mut out = Vec::with_capacity(hits.len());
        for (score, payload) in hits {
            let doc_id = payload
                .get("doc_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let text = payload
                .get("text")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            out.push(ScoredDoc { doc_id, score, text });
        }
        Ok(out)
    }
}
