//! Pipeline orchestrator: configuration → one concrete experiment run.
//!
//! The run is a single logical sequence of stages; within
//! `EmbeddingResolve` and `Retrieving`, independent remote calls are issued
//! concurrently up to the configured limits and re-associated by original
//! index. Per-query and per-sample failures are recorded, not fatal; the
//! stages before `Retrieving` abort the run on error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use embed_cache::{CacheKey, EmbeddingCache};
use futures::stream::{self, StreamExt};
use llm_service::{LlmModelConfig, LlmProvider, LlmServiceProfiles, RetryPolicy, judge};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, split_documents};
use crate::config::{EmbedderConfig, ExperimentConfig, JudgeConfig, LlmSection};
use crate::embedding::Embedder;
use crate::errors::{ExperimentError, Result};
use crate::evaluate::{EvaluationSummary, RetrievalEvaluator};
use crate::factory::{ComponentFactory, ComponentRegistry};
use crate::loader::{DocumentSource, FsDocumentSource, load_query_set};
use crate::record::{Passage, QueryOutcome, QueryRecord, RankedHit, SampledQuery};
use crate::report::{ExperimentInfo, SummaryReport};
use crate::retrieval::Retriever;
use crate::sample::sample_queries;

const GENERATION_SYSTEM: &str = "You are a career assistant. Recommend the most relevant \
postings from the retrieved context for the given user, explaining each pick against their \
profile, and close with one actionable piece of advice.";

/// Run state machine. A failing stage aborts the run; the error is logged
/// together with the stage it interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Chunking,
    EmbeddingResolve,
    Indexing,
    Retrieving,
    Evaluating,
    Sampling,
    Done,
}

/// Everything a run produces for the result writer.
#[derive(Debug)]
pub struct ExperimentReport {
    pub summary: SummaryReport,
    pub queries: Vec<QueryRecord>,
    pub outcomes: Vec<QueryOutcome>,
    pub evaluation: EvaluationSummary,
    pub samples: Vec<SampledQuery>,
}

/// The experiment pipeline, fully resolved and ready to run.
pub struct ExperimentPipeline {
    cfg: ExperimentConfig,
    svc: Arc<LlmServiceProfiles>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<Embedder>,
    retriever: Arc<dyn Retriever>,
    cache: EmbeddingCache,
    source: Box<dyn DocumentSource>,
    retry: RetryPolicy,
}

impl ExperimentPipeline {
    /// Resolves all components from configuration using the standard
    /// registry.
    ///
    /// # Errors
    /// Configuration errors (invalid values, unknown strategy names) abort
    /// here, before any remote call.
    pub fn from_config(cfg: ExperimentConfig) -> Result<Self> {
        cfg.validate()?;
        let svc = build_profiles(&cfg)?;
        let retry = RetryPolicy::default();
        let factory = ComponentFactory::new(ComponentRegistry::standard(svc.clone(), retry));
        Self::with_factory(cfg, factory, svc, retry)
    }

    /// Resolves components against a caller-supplied factory (dependency
    /// injection seam for embedders/chunkers/retrievers).
    pub fn with_factory(
        cfg: ExperimentConfig,
        factory: ComponentFactory,
        svc: Arc<LlmServiceProfiles>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let provider = factory.resolve_embedder(&cfg.embedder)?;
        let chunker = factory.resolve_chunker(&cfg.chunker)?;
        let embedder = Arc::new(Embedder::new(
            provider,
            cfg.embedder.batch_size,
            cfg.embedder.concurrency,
        ));
        let retriever = factory.resolve_retriever(&cfg.retriever, embedder.clone())?;
        let cache = EmbeddingCache::open(cfg.data.cache_dir.clone())?;
        let source = Box::new(FsDocumentSource::new(cfg.data.source_locations.clone()));

        Ok(Self {
            cfg,
            svc,
            chunker,
            embedder,
            retriever,
            cache,
            source,
            retry,
        })
    }

    /// Executes the full run.
    ///
    /// # Errors
    /// Fatal errors (unreachable source, empty inputs, indexing failure)
    /// abort with no partial report; per-query and per-sample failures are
    /// recorded inside the report instead.
    pub async fn run(&self) -> Result<ExperimentReport> {
        let started = Instant::now();
        let mut stage = Stage::Loading;
        info!(
            "starting experiment `{}` ({})",
            self.cfg.experiment_name,
            self.cfg.experiment_id()
        );

        let result = self.run_stages(&mut stage, started).await;
        if let Err(e) = &result {
            error!("experiment failed during {stage:?}: {e}");
        }
        result
    }

    async fn run_stages(&self, stage: &mut Stage, started: Instant) -> Result<ExperimentReport> {
        // Loading
        let documents = self.source.load()?;
        if documents.is_empty() {
            return Err(ExperimentError::Fatal("no documents loaded".into()));
        }
        let queries = load_query_set(&self.cfg.data.query_set_path)?;

        // Chunking
        *stage = Stage::Chunking;
        let passages = split_documents(self.chunker.as_ref(), &documents);
        info!(
            "chunked {} documents into {} passages",
            documents.len(),
            passages.len()
        );
        if passages.is_empty() {
            return Err(ExperimentError::Fatal("chunking produced no passages".into()));
        }

        // EmbeddingResolve
        *stage = Stage::EmbeddingResolve;
        let (passages, vectors, cache_hit) =
            resolve_embeddings(&self.cache, &self.embedder, self.chunker.as_ref(), passages)
                .await?;

        // Indexing
        *stage = Stage::Indexing;
        self.retriever.index(&passages, &vectors).await?;

        // Retrieving
        *stage = Stage::Retrieving;
        let outcomes = self.retrieve_all(&queries).await;

        // Evaluating
        *stage = Stage::Evaluating;
        let evaluator = RetrievalEvaluator::new(
            self.cfg.evaluation.k_values.clone(),
            self.cfg.evaluation.metrics.clone(),
        );
        let evaluation = evaluator.evaluate(&queries, &outcomes);

        // Sampling
        *stage = Stage::Sampling;
        let samples = if self.cfg.judge.enabled && self.cfg.judge.sample_size > 0 {
            self.sample_and_judge(&queries, &outcomes).await
        } else {
            Vec::new()
        };

        *stage = Stage::Done;
        let summary = SummaryReport {
            experiment_info: ExperimentInfo {
                name: self.cfg.experiment_name.clone(),
                description: self.cfg.description.clone(),
                experiment_id: self.cfg.experiment_id(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_seconds: started.elapsed().as_secs_f64(),
            },
            config: serde_json::to_value(&self.cfg)?,
            aggregate_metrics: evaluation.aggregate.clone(),
            document_count: documents.len(),
            passage_count: passages.len(),
            query_count: queries.len(),
            evaluated_count: evaluation.evaluated,
            failed_count: evaluation.failed,
            cache_hit,
        };

        info!(
            "experiment `{}` done in {:.2}s ({} queries, {} failed)",
            self.cfg.experiment_name,
            summary.experiment_info.duration_seconds,
            summary.query_count,
            summary.failed_count,
        );

        Ok(ExperimentReport {
            summary,
            queries,
            outcomes,
            evaluation,
            samples,
        })
    }

    /// Answers every query, up to `query_concurrency` in flight, outcomes
    /// re-associated by original index. A failed query becomes an error
    /// marker, never an abort.
    async fn retrieve_all(&self, queries: &[QueryRecord]) -> Vec<QueryOutcome> {
        let top_k = self.cfg.retriever.top_k;
        let threshold = self.cfg.retriever.similarity_threshold;
        let concurrency = self.cfg.retriever.query_concurrency.max(1);

        let results: Vec<(usize, QueryOutcome)> = stream::iter(queries.iter().enumerate())
            .map(|(i, query)| async move {
                match self.retriever.query(&query.text, top_k, threshold).await {
                    Ok(hits) => (i, QueryOutcome::ok(&query.query_id, hits)),
                    Err(e) => {
                        warn!("query {} failed: {e}", query.query_id);
                        (i, QueryOutcome::failed(&query.query_id, e.to_string()))
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut slots: Vec<Option<QueryOutcome>> = (0..queries.len()).map(|_| None).collect();
        for (i, outcome) in results {
            slots[i] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }

    /// Generates and judges responses for the sampled queries. Failures are
    /// per-sample.
    async fn sample_and_judge(
        &self,
        queries: &[QueryRecord],
        outcomes: &[QueryOutcome],
    ) -> Vec<SampledQuery> {
        let selected = sample_queries(queries, self.cfg.judge.sample_size);
        let hits_by_id: HashMap<&str, &QueryOutcome> = outcomes
            .iter()
            .map(|o| (o.query_id.as_str(), o))
            .collect();
        let concurrency = self.cfg.judge.max_concurrency.max(1);
        let n = selected.len();

        let results: Vec<(usize, SampledQuery)> = stream::iter(selected.into_iter().enumerate())
            .map(|(i, record)| {
                let hits = hits_by_id
                    .get(record.query_id.as_str())
                    .map(|o| o.hits.clone())
                    .unwrap_or_default();
                async move { (i, self.judge_one(record, hits).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut slots: Vec<Option<SampledQuery>> = (0..n).map(|_| None).collect();
        for (i, sample) in results {
            slots[i] = Some(sample);
        }
        slots.into_iter().flatten().collect()
    }

    async fn judge_one(&self, record: QueryRecord, hits: Vec<RankedHit>) -> SampledQuery {
        let prompt = build_generation_prompt(&record, &hits);

        let response = match self
            .retry
            .run("generate", || self.svc.generate(&prompt, Some(GENERATION_SYSTEM)))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("generation failed for {}: {e}", record.query_id);
                return SampledQuery {
                    record,
                    response: None,
                    judge_scores: None,
                    error: Some(format!("generation failed: {e}")),
                };
            }
        };

        let profile_json = record.profile.to_string();
        let scores = self
            .retry
            .run("judge", || {
                judge::score(
                    &self.svc,
                    &self.cfg.judge.metrics,
                    &record.text,
                    &profile_json,
                    &response,
                )
            })
            .await;

        match scores {
            Ok(scores) => SampledQuery {
                record,
                response: Some(response),
                judge_scores: Some(scores),
                error: None,
            },
            Err(e) => {
                warn!("judge failed for {}: {e}", record.query_id);
                SampledQuery {
                    record,
                    response: Some(response),
                    judge_scores: None,
                    error: Some(format!("judge failed: {e}")),
                }
            }
        }
    }
}

/// The cache gate of the run: load `(passages, vectors)` for the derived
/// key, or compute and then `put` before proceeding.
///
/// Put-after-compute ordering guarantees at most one expensive computation
/// per distinct `(embedder, chunker-config)` pair across the cache's
/// lifetime; a crash between compute and put simply recomputes next run. A
/// failed save is a warning, not an abort — the run can finish without a
/// cache.
pub async fn resolve_embeddings(
    cache: &EmbeddingCache,
    embedder: &Embedder,
    chunker: &dyn Chunker,
    passages: Vec<Passage>,
) -> Result<(Vec<Passage>, Vec<Vec<f32>>, bool)> {
    let model = embedder.model_id();
    let params = chunker.params();
    let key = CacheKey::derive(&model, chunker.id(), &params);

    if let Some(entry) = cache.get::<Passage>(&key)? {
        info!("using cached embeddings for {key}");
        return Ok((entry.passages, entry.vectors, true));
    }

    info!("computing embeddings for {key}");
    let vectors = embedder.embed_passages(&passages).await?;

    if let Err(e) = cache.put(&key, &passages, &vectors, &model, chunker.id(), &params) {
        warn!("cache save failed ({e}); continuing without cache");
    }
    Ok((passages, vectors, false))
}

/// Builds the shared LLM service from the config's embedder/llm/judge
/// sections.
pub fn build_profiles(cfg: &ExperimentConfig) -> Result<Arc<LlmServiceProfiles>> {
    let embedding = embedder_profile(&cfg.embedder)?;
    let generation = cfg.llm.as_ref().map(llm_profile).transpose()?;
    let judge = judge_profile(&cfg.judge)?;

    Ok(Arc::new(LlmServiceProfiles::new(
        embedding, generation, judge,
    )?))
}

fn provider_defaults(provider: LlmProvider) -> (&'static str, Option<&'static str>) {
    match provider {
        LlmProvider::Ollama => ("http://localhost:11434", None),
        LlmProvider::OpenAI => ("https://api.openai.com", Some("OPENAI_API_KEY")),
    }
}

fn api_key_from_env(explicit: Option<&String>, default_var: Option<&str>) -> Option<String> {
    explicit
        .map(String::as_str)
        .or(default_var)
        .and_then(|var| std::env::var(var).ok())
}

fn embedder_profile(cfg: &EmbedderConfig) -> Result<LlmModelConfig> {
    let provider = LlmProvider::parse(&cfg.r#type)?;
    let (default_endpoint, default_key_var) = provider_defaults(provider);
    Ok(LlmModelConfig {
        provider,
        model: cfg.model_name.clone(),
        endpoint: cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint.to_string()),
        api_key: api_key_from_env(cfg.api_key_env.as_ref(), default_key_var),
        max_tokens: None,
        temperature: None,
        timeout_secs: cfg.timeout_secs.or(Some(60)),
    })
}

fn llm_profile(cfg: &LlmSection) -> Result<LlmModelConfig> {
    let provider = LlmProvider::parse(&cfg.r#type)?;
    let (default_endpoint, default_key_var) = provider_defaults(provider);
    Ok(LlmModelConfig {
        provider,
        model: cfg.model_name.clone(),
        endpoint: cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint.to_string()),
        api_key: api_key_from_env(cfg.api_key_env.as_ref(), default_key_var),
        max_tokens: Some(cfg.max_tokens),
        temperature: Some(cfg.temperature),
        timeout_secs: Some(cfg.timeout_secs),
    })
}

fn judge_profile(cfg: &JudgeConfig) -> Result<Option<LlmModelConfig>> {
    if !cfg.enabled {
        return Ok(None);
    }
    let provider = LlmProvider::parse(&cfg.judge_provider)?;
    let (default_endpoint, default_key_var) = provider_defaults(provider);
    Ok(Some(LlmModelConfig {
        provider,
        model: cfg.judge_model.clone(),
        endpoint: cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint.to_string()),
        api_key: api_key_from_env(cfg.api_key_env.as_ref(), default_key_var),
        max_tokens: None,
        // Grading should be near-deterministic.
        temperature: Some(0.1),
        timeout_secs: Some(cfg.timeout_secs),
    }))
}

/// Prompt for the response-generation path: profile + query + retrieved
/// context.
fn build_generation_prompt(record: &QueryRecord, hits: &[RankedHit]) -> String {
    let mut context = String::new();
    for (i, hit) in hits.iter().take(5).enumerate() {
        let text = hit.text.as_deref().unwrap_or(&hit.doc_id);
        let clipped: String = text.chars().take(1500).collect();
        context.push_str(&format!("[{}] (doc {})\n{}\n\n", i + 1, hit.doc_id, clipped));
    }
    if context.is_empty() {
        context.push_str("(no documents retrieved)\n");
    }

    format!(
        "<user profile>\n{}\n\n<user query>\n{}\n\n<retrieved postings>\n{}",
        record.profile, record.text, context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::NoChunker;
    use crate::embedding::tests::MockProvider;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    fn passages(n: usize) -> Vec<Passage> {
        (0..n)
            .map(|i| Passage {
                doc_id: format!("d{i}"),
                index: 0,
                text: format!("t{i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn second_resolve_with_same_key_skips_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider.clone(), 2, 2);
        let chunker = NoChunker;

        let (p1, v1, hit1) = resolve_embeddings(&cache, &embedder, &chunker, passages(5))
            .await
            .unwrap();
        assert!(!hit1);
        assert_eq!(v1.len(), 5);
        let calls_after_first = provider.calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        // Identical (embedder, chunker-config): zero further provider calls.
        let (p2, v2, hit2) = resolve_embeddings(&cache, &embedder, &chunker, passages(5))
            .await
            .unwrap();
        assert!(hit2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(p1, p2);
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider, 2, 1);
        let chunker = NoChunker;

        // Batch 2 of 3 fails ("boom" lands at index 3 with batch_size 2).
        let mut input = passages(6);
        input[3].text = "boom".into();

        let err = resolve_embeddings(&cache, &embedder, &chunker, input).await;
        assert!(err.is_err());
        assert!(cache.list_keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_key_separates_chunker_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path()).unwrap();
        let provider = Arc::new(MockProvider::new());
        let embedder = Embedder::new(provider.clone(), 4, 1);

        let small = crate::chunking::RecursiveChunker::new(100, 10).unwrap();
        let large = crate::chunking::RecursiveChunker::new(200, 10).unwrap();

        resolve_embeddings(&cache, &embedder, &small, passages(2))
            .await
            .unwrap();
        let calls = provider.calls.load(Ordering::SeqCst);

        // Different chunk_size → different key → recompute.
        let (_, _, hit) = resolve_embeddings(&cache, &embedder, &large, passages(2))
            .await
            .unwrap();
        assert!(!hit);
        assert!(provider.calls.load(Ordering::SeqCst) > calls);
        assert_eq!(cache.list_keys().unwrap().len(), 2);
    }

    #[test]
    fn generation_prompt_includes_profile_and_context() {
        let record = QueryRecord {
            query_id: "q1".into(),
            text: "cloud internships".into(),
            profile: serde_json::json!({"major": "cs"}),
            ground_truth: vec![],
        };
        let hits = vec![RankedHit {
            doc_id: "d1".into(),
            score: 0.9,
            text: Some("AWS cloud intern posting".into()),
        }];
        let prompt = build_generation_prompt(&record, &hits);
        assert!(prompt.contains("cloud internships"));
        assert!(prompt.contains("AWS cloud intern posting"));
        assert!(prompt.contains("major"));
    }

    #[test]
    fn build_profiles_rejects_unknown_provider() {
        let cfg = EmbedderConfig {
            r#type: "hugging".into(),
            model_name: "m".into(),
            batch_size: 4,
            concurrency: 2,
            endpoint: None,
            api_key_env: None,
            timeout_secs: None,
            params: BTreeMap::new(),
        };
        assert!(embedder_profile(&cfg).is_err());
    }
}
