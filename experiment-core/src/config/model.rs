//! Configuration data structures for the experiment harness.
//!
//! Groups:
//! - [`ExperimentConfig`] — top-level container for all config sections
//! - [`EmbedderConfig`] / [`ChunkerConfig`] / [`RetrieverConfig`] — the three
//!   pluggable strategy roles
//! - [`LlmSection`] — generation model (response synthesis path)
//! - [`DataConfig`] — document sources, query set, cache root
//! - [`EvaluationConfig`] — retrieval metrics and k-values
//! - [`JudgeConfig`] — judge-based generation evaluation
//!
//! All structs are `serde`-friendly so they can be loaded from YAML and
//! echoed verbatim into result artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ExperimentError, Result};

/// Top-level configuration for one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    #[serde(default)]
    pub description: String,
    pub embedder: EmbedderConfig,
    pub chunker: ChunkerConfig,
    pub retriever: RetrieverConfig,
    /// Generation model for the response-synthesis path; optional when the
    /// judge stage is disabled.
    #[serde(default)]
    pub llm: Option<LlmSection>,
    pub data: DataConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Provider name: `ollama` or `openai`.
    pub r#type: String,
    pub model_name: String,
    /// Passages per provider request.
    #[serde(default = "default_embed_batch")]
    pub batch_size: usize,
    /// Concurrent in-flight batches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Provider endpoint; defaults per provider when omitted.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Chunking strategy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Strategy name: `no_chunk`, `fixed`, `recursive`, or `token`.
    pub r#type: String,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    /// Strategy-specific extras (e.g. `tokenizer_path` for `token`).
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Retrieval backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Backend name: `qdrant`.
    pub r#type: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// gRPC endpoint of the vector store.
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: u64,
    /// Candidates below this similarity are dropped server-side.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_distance")]
    pub distance: String,
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch: usize,
    #[serde(default)]
    pub on_disk: bool,
    /// Concurrent in-flight retrieval queries.
    #[serde(default = "default_concurrency")]
    pub query_concurrency: usize,
}

/// Generation model section (response synthesis for sampled queries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Provider name: `ollama` or `openai`.
    pub r#type: String,
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Data locations for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Files or directories holding source documents (.jsonl/.json/.txt/.md).
    pub source_locations: Vec<PathBuf>,
    /// JSONL query set with ground truth and user profiles.
    pub query_set_path: PathBuf,
    /// Embedding cache root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

/// Retrieval evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_k_values")]
    pub k_values: Vec<usize>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            k_values: default_k_values(),
        }
    }
}

/// Judge-based generation evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Distinct profiles to sample.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Only `profile_based` is supported; sampling must be reproducible.
    #[serde(default = "default_sample_strategy")]
    pub sample_strategy: String,
    #[serde(default = "default_judge_model")]
    pub judge_model: String,
    /// Provider of the judge model: `ollama` or `openai`.
    #[serde(default = "default_judge_provider")]
    pub judge_provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_judge_metrics")]
    pub metrics: Vec<String>,
    /// Concurrent in-flight generate+judge calls.
    #[serde(default = "default_judge_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_judge_timeout")]
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_size: default_sample_size(),
            sample_strategy: default_sample_strategy(),
            judge_model: default_judge_model(),
            judge_provider: default_judge_provider(),
            endpoint: None,
            api_key_env: None,
            metrics: default_judge_metrics(),
            max_concurrency: default_judge_concurrency(),
            timeout_secs: default_judge_timeout(),
        }
    }
}

impl ExperimentConfig {
    /// Validate config sanity (no degenerate or absurd values).
    ///
    /// Runs before any component is built or any remote call is issued.
    pub fn validate(&self) -> Result<()> {
        if self.experiment_name.trim().is_empty() {
            return Err(ExperimentError::config(
                "experiment_name",
                "must not be empty",
            ));
        }
        if self.embedder.batch_size == 0 {
            return Err(ExperimentError::config(
                "embedder.batch_size",
                "must be greater than 0",
            ));
        }
        if let (Some(size), Some(overlap)) = (self.chunker.chunk_size, self.chunker.chunk_overlap)
        {
            if size == 0 {
                return Err(ExperimentError::config(
                    "chunker.chunk_size",
                    "must be greater than 0",
                ));
            }
            if overlap >= size {
                return Err(ExperimentError::config(
                    "chunker.chunk_overlap",
                    format!("overlap {overlap} must be smaller than chunk_size {size}"),
                ));
            }
        }
        if self.retriever.top_k == 0 {
            return Err(ExperimentError::config(
                "retriever.top_k",
                "must be greater than 0",
            ));
        }
        if self.retriever.upsert_batch == 0 {
            return Err(ExperimentError::config(
                "retriever.upsert_batch",
                "must be greater than 0",
            ));
        }
        if self.evaluation.k_values.is_empty() {
            return Err(ExperimentError::config(
                "evaluation.k_values",
                "must not be empty",
            ));
        }
        if self.evaluation.k_values.iter().any(|&k| k == 0) {
            return Err(ExperimentError::config(
                "evaluation.k_values",
                "k values must be greater than 0",
            ));
        }
        const KNOWN_METRICS: [&str; 5] = ["recall@k", "precision@k", "mrr", "map", "ndcg@k"];
        for metric in &self.evaluation.metrics {
            if !KNOWN_METRICS.contains(&metric.as_str()) {
                return Err(ExperimentError::config(
                    "evaluation.metrics",
                    format!("unknown metric `{metric}`"),
                ));
            }
        }
        if self.data.query_set_path.as_os_str().is_empty() {
            return Err(ExperimentError::config(
                "data.query_set_path",
                "must not be empty",
            ));
        }
        if self.judge.enabled {
            if self.judge.sample_strategy != "profile_based" {
                return Err(ExperimentError::config(
                    "judge.sample_strategy",
                    format!(
                        "unsupported strategy `{}`; only `profile_based` selection is reproducible",
                        self.judge.sample_strategy
                    ),
                ));
            }
            if self.judge.metrics.is_empty() {
                return Err(ExperimentError::config(
                    "judge.metrics",
                    "must not be empty when the judge stage is enabled",
                ));
            }
            if self.llm.is_none() {
                return Err(ExperimentError::config(
                    "llm",
                    "a generation model is required when the judge stage is enabled",
                ));
            }
        }
        Ok(())
    }

    /// Compact run identifier used in artifact file names.
    pub fn experiment_id(&self) -> String {
        let scrub = |s: &str| s.replace(['-', '.', '/', ':'], "_");
        let mut parts = vec![
            format!("emb_{}", scrub(&self.embedder.model_name)),
            format!("chunk_{}", scrub(&self.chunker.r#type)),
            format!("retr_{}", scrub(&self.retriever.r#type)),
        ];
        if let Some(llm) = &self.llm {
            parts.push(format!("llm_{}", scrub(&llm.model_name)));
        }
        parts.join("_")
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_embed_batch() -> usize {
    16
}

fn default_concurrency() -> usize {
    4
}

fn default_collection() -> String {
    "experiment".into()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_top_k() -> u64 {
    10
}

fn default_distance() -> String {
    "cosine".into()
}

fn default_upsert_batch() -> usize {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/embeddings")
}

fn default_metrics() -> Vec<String> {
    ["recall@k", "precision@k", "mrr", "map", "ndcg@k"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_k_values() -> Vec<usize> {
    vec![1, 3, 5, 10]
}

fn default_sample_size() -> usize {
    15
}

fn default_sample_strategy() -> String {
    "profile_based".into()
}

fn default_judge_model() -> String {
    "gpt-4o-mini".into()
}

fn default_judge_provider() -> String {
    "openai".into()
}

fn default_judge_metrics() -> Vec<String> {
    [
        "recommendation_quality",
        "personalization_score",
        "response_helpfulness",
        "profile_alignment",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_judge_concurrency() -> usize {
    3
}

fn default_judge_timeout() -> u64 {
    300
}
