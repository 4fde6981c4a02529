//! Embedding strategy: provider trait + batching executor.
//!
//! The executor splits passages into fixed-size batches, keeps up to
//! `concurrency` batches in flight, and re-associates results by original
//! batch index so output order always matches input order regardless of
//! completion order. Any batch failure fails the whole call — the cache
//! store never sees a partial vector set.

use std::{future::Future, pin::Pin, sync::Arc};

use futures::stream::{self, StreamExt};
use llm_service::{LlmServiceProfiles, RetryPolicy};
use tracing::{debug, info};

use crate::errors::{ExperimentError, Result};
use crate::record::Passage;

/// Boxed future type used by object-safe async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in your own embedding backend. A batch must
/// fail atomically: either every input gets a vector, in input order, or the
/// whole call errors.
pub trait EmbeddingsProvider: Send + Sync {
    /// Model identifier; feeds cache-key derivation.
    fn id(&self) -> String;

    /// Embeds one batch of texts, preserving order.
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// [`EmbeddingsProvider`] backed by the shared LLM service's embedding
/// profile, with bounded retry on transient provider errors.
pub struct ProfileEmbedder {
    svc: Arc<LlmServiceProfiles>,
    model: String,
    retry: RetryPolicy,
}

impl ProfileEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, retry: RetryPolicy) -> Self {
        let model = svc.embedding_model().to_string();
        Self { svc, model, retry }
    }
}

impl EmbeddingsProvider for ProfileEmbedder {
    fn id(&self) -> String {
        self.model.clone()
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        Box::pin(async move {
            self.retry
                .run("embed_batch", || self.svc.embed_batch(texts))
                .await
                .map_err(ExperimentError::from)
        })
    }
}

/// Batching executor over an [`EmbeddingsProvider`].
pub struct Embedder {
    provider: Arc<dyn EmbeddingsProvider>,
    batch_size: usize,
    concurrency: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingsProvider>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Embedding-model identifier of the underlying provider.
    pub fn model_id(&self) -> String {
        self.provider.id()
    }

    /// Embeds all passages, returning vectors ordered 1:1 with the input.
    pub async fn embed_passages(&self, passages: &[Passage]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        self.embed_texts(texts).await
    }

    /// Embeds `texts` in concurrent fixed-size batches.
    ///
    /// # Errors
    /// Fails as a whole if any batch fails; no partial output is returned.
    pub async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total = texts.len();
        let batches: Vec<(usize, Vec<String>)> = texts
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .enumerate()
            .collect();
        let n_batches = batches.len();

        info!(
            "embedding {} texts in {} batches (batch_size={}, concurrency={})",
            total, n_batches, self.batch_size, self.concurrency
        );

        let results: Vec<(usize, Vec<Vec<f32>>)> = stream::iter(batches)
            .map(|(i, batch)| {
                let provider = self.provider.clone();
                async move {
                    let vectors = provider.embed_batch(&batch).await?;
                    Ok::<(usize, Vec<Vec<f32>>), ExperimentError>((i, vectors))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        // Re-associate by batch index, not completion order.
        let mut slots: Vec<Option<Vec<Vec<f32>>>> = (0..n_batches).map(|_| None).collect();
        for (i, vectors) in results {
            slots[i] = Some(vectors);
        }
        let mut out = Vec::with_capacity(total);
        for slot in slots {
            if let Some(vectors) = slot {
                out.extend(vectors);
            }
        }

        debug!("embedded {} vectors", out.len());
        Ok(out)
    }

    /// Embeds a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.provider.embed_batch(&texts).await?;
        vectors.pop().ok_or_else(|| {
            ExperimentError::from(llm_service::LlmError::Decode(
                "provider returned no vector for query".into(),
            ))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Offline provider: each text `t<i>` embeds to `[i]`, so order mixups
    /// are visible in the output. Batches containing "boom" fail.
    pub(crate) struct MockProvider {
        pub calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn vector_for(text: &str) -> Vec<f32> {
            let i: f32 = text.trim_start_matches('t').parse().unwrap_or(-1.0);
            vec![i, 1.0]
        }
    }

    impl EmbeddingsProvider for MockProvider {
        fn id(&self) -> String {
            "mock-embedder".into()
        }

        fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if texts.iter().any(|t| t.contains("boom")) {
                    return Err(ExperimentError::from(llm_service::LlmError::Decode(
                        "boom".into(),
                    )));
                }
                Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
            })
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{i}")).collect()
    }

    #[tokio::test]
    async fn output_order_matches_input_order() {
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider.clone(), 3, 4);

        let out = embedder.embed_texts(texts(10)).await.unwrap();
        assert_eq!(out.len(), 10);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(v[0], i as f32);
        }
        // ceil(10 / 3) batches issued.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn one_failing_batch_fails_the_whole_call() {
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider, 2, 2);

        let mut input = texts(6);
        input[3] = "boom".into(); // lands in batch 2 of 3
        assert!(embedder.embed_texts(input).await.is_err());
    }

    #[tokio::test]
    async fn empty_input_needs_no_provider_calls() {
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider.clone(), 4, 2);
        let out = embedder.embed_texts(Vec::new()).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
