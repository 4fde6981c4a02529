//! Retrieval strategy: index passages, answer queries.
//!
//! [`QdrantRetriever`] embeds query text with the *same* [`Embedder`] used
//! for indexing — it holds that instance by construction, so an
//! index/query embedder mismatch cannot be configured into existence.

use std::sync::Arc;

use tracing::{debug, info};
use vector_store::{StoreConfig, VectorStore};

use crate::embedding::{BoxFuture, Embedder};
use crate::errors::{ExperimentError, Result};
use crate::record::{Passage, RankedHit};

/// Capability contract of a retrieval strategy.
pub trait Retriever: Send + Sync {
    /// Upserts all (passage, vector) pairs into a fresh collection.
    /// Re-indexing the same passage id overwrites, not duplicates.
    fn index<'a>(
        &'a self,
        passages: &'a [Passage],
        vectors: &'a [Vec<f32>],
    ) -> BoxFuture<'a, Result<u64>>;

    /// Embeds `text` and returns up to `top_k` candidates at or above
    /// `similarity_threshold`, ranked by descending similarity.
    fn query<'a>(
        &'a self,
        text: &'a str,
        top_k: u64,
        similarity_threshold: Option<f32>,
    ) -> BoxFuture<'a, Result<Vec<RankedHit>>>;
}

/// Qdrant-backed retriever.
pub struct QdrantRetriever {
    store: VectorStore,
    embedder: Arc<Embedder>,
}

impl QdrantRetriever {
    /// # Errors
    /// Returns `ExperimentError::Store` when the client cannot be built.
    pub fn new(cfg: StoreConfig, embedder: Arc<Embedder>) -> Result<Self> {
        let store = VectorStore::new(cfg)?;
        Ok(Self { store, embedder })
    }
}

impl Retriever for QdrantRetriever {
    fn index<'a>(
        &'a self,
        passages: &'a [Passage],
        vectors: &'a [Vec<f32>],
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let dim = vectors
                .first()
                .map(|v| v.len())
                .ok_or_else(|| ExperimentError::Fatal("nothing to index: no vectors".into()))?;

            info!("indexing {} passages (dim={dim})", passages.len());
            self.store.reset_collection(dim).await?;

            let items: Vec<(String, usize, String)> = passages
                .iter()
                .map(|p| (p.doc_id.clone(), p.index, p.text.clone()))
                .collect();
            let total = self.store.index(&items, vectors, dim).await?;
            debug!("indexed {total} points");
            Ok(total)
        })
    }

    fn query<'a>(
        &'a self,
        text: &'a str,
        top_k: u64,
        similarity_threshold: Option<f32>,
    ) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
        Box::pin(async move {
            let query_vector = self.embedder.embed_query(text).await?;
            let hits = self
                .store
                .search(query_vector, top_k, similarity_threshold)
                .await?;
            Ok(hits
                .into_iter()
                .map(|h| RankedHit {
                    doc_id: h.doc_id,
                    score: h.score,
                    text: h.text,
                })
                .collect())
        })
    }
}
