//! Retrieval quality metrics over ranked results and ground truth.
//!
//! Per query: Precision@k, Recall@k, MRR, AP (for MAP), nDCG@k with binary
//! relevance. Aggregates are arithmetic means over all evaluated queries.
//! Every zero denominator resolves to a defined 0.0 — no NaN or infinity
//! ever reaches a report. Queries with empty ground truth are counted at
//! zero rather than skipped, which keeps aggregate denominators stable
//! across runs.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::record::{QueryOutcome, QueryRecord};

/// Per-query metric values, keyed by metric name (e.g. `recall@10`).
#[derive(Clone, Debug)]
pub struct QueryEvaluation {
    pub query_id: String,
    pub metrics: BTreeMap<String, f64>,
}

/// Full evaluation output: per-query rows plus aggregate means.
#[derive(Clone, Debug, Default)]
pub struct EvaluationSummary {
    pub per_query: Vec<QueryEvaluation>,
    pub aggregate: BTreeMap<String, f64>,
    /// Queries that entered aggregation (failed outcomes are excluded).
    pub evaluated: usize,
    /// Queries skipped because their retrieval failed.
    pub failed: usize,
}

/// Computes the configured metric set for the configured k-values.
pub struct RetrievalEvaluator {
    k_values: Vec<usize>,
    metrics: Vec<String>,
}

impl RetrievalEvaluator {
    pub fn new(k_values: Vec<usize>, metrics: Vec<String>) -> Self {
        Self { k_values, metrics }
    }

    /// Evaluates outcomes against their query records (matched by position).
    ///
    /// Failed outcomes are excluded from every denominator; they are counted
    /// in [`EvaluationSummary::failed`] only.
    pub fn evaluate(
        &self,
        queries: &[QueryRecord],
        outcomes: &[QueryOutcome],
    ) -> EvaluationSummary {
        let mut summary = EvaluationSummary::default();
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();

        for (query, outcome) in queries.iter().zip(outcomes.iter()) {
            if !outcome.is_ok() {
                summary.failed += 1;
                continue;
            }

            let retrieved = outcome.retrieved_ids();
            let relevant: HashSet<&str> = query.ground_truth.iter().map(String::as_str).collect();
            let metrics = self.query_metrics(&retrieved, &relevant);

            for (name, value) in &metrics {
                *sums.entry(name.clone()).or_insert(0.0) += value;
            }
            summary.per_query.push(QueryEvaluation {
                query_id: query.query_id.clone(),
                metrics,
            });
            summary.evaluated += 1;
        }

        if summary.evaluated > 0 {
            let n = summary.evaluated as f64;
            summary.aggregate = sums.into_iter().map(|(k, v)| (k, v / n)).collect();
        }

        info!(
            "evaluated {} queries ({} failed, excluded)",
            summary.evaluated, summary.failed
        );
        debug!("aggregate metrics: {:?}", summary.aggregate);
        summary
    }

    fn query_metrics(
        &self,
        retrieved: &[String],
        relevant: &HashSet<&str>,
    ) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for metric in &self.metrics {
            match metric.as_str() {
                "recall@k" => {
                    for &k in &self.k_values {
                        out.insert(format!("recall@{k}"), recall_at_k(retrieved, relevant, k));
                    }
                }
                "precision@k" => {
                    for &k in &self.k_values {
                        out.insert(
                            format!("precision@{k}"),
                            precision_at_k(retrieved, relevant, k),
                        );
                    }
                }
                "mrr" => {
                    out.insert("mrr".into(), reciprocal_rank(retrieved, relevant));
                }
                "map" => {
                    out.insert("map".into(), average_precision(retrieved, relevant));
                }
                "ndcg@k" => {
                    for &k in &self.k_values {
                        out.insert(format!("ndcg@{k}"), ndcg_at_k(retrieved, relevant, k));
                    }
                }
                // Unknown metric names were rejected at config validation;
                // tolerate them here rather than panic.
                _ => {}
            }
        }
        out
    }
}

/// `|R[:k] ∩ G|` with set semantics: a document retrieved through several
/// passages counts once.
fn hits_at_k(retrieved: &[String], relevant: &HashSet<&str>, k: usize) -> usize {
    let top_k: HashSet<&str> = retrieved.iter().take(k).map(String::as_str).collect();
    top_k.iter().filter(|id| relevant.contains(*id)).count()
}

/// `|R[:k] ∩ G| / k`.
fn precision_at_k(retrieved: &[String], relevant: &HashSet<&str>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_at_k(retrieved, relevant, k) as f64 / k as f64
}

/// `|R[:k] ∩ G| / |G|`; 0 when the ground truth is empty.
fn recall_at_k(retrieved: &[String], relevant: &HashSet<&str>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_at_k(retrieved, relevant, k) as f64 / relevant.len() as f64
}

/// `1 / rank` of the first relevant item, 0 when none appears.
fn reciprocal_rank(retrieved: &[String], relevant: &HashSet<&str>) -> f64 {
    retrieved
        .iter()
        .position(|id| relevant.contains(id.as_str()))
        .map(|pos| 1.0 / (pos + 1) as f64)
        .unwrap_or(0.0)
}

/// Mean of Precision@i at relevant ranks i, divided by `|G|`; 0 when the
/// ground truth is empty.
fn average_precision(retrieved: &[String], relevant: &HashSet<&str>) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let mut found = 0usize;
    let mut sum = 0.0;
    for (pos, id) in retrieved.iter().enumerate() {
        if relevant.contains(id.as_str()) {
            found += 1;
            sum += found as f64 / (pos + 1) as f64;
        }
    }
    sum / relevant.len() as f64
}

/// `DCG@k / IDCG@k` with binary relevance; 0 when `IDCG@k` is 0.
fn ndcg_at_k(retrieved: &[String], relevant: &HashSet<&str>, k: usize) -> f64 {
    let dcg: f64 = retrieved
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, id)| relevant.contains(id.as_str()))
        .map(|(pos, _)| 1.0 / ((pos + 2) as f64).log2())
        .sum();

    let ideal_len = relevant.len().min(k);
    let idcg: f64 = (0..ideal_len).map(|pos| 1.0 / ((pos + 2) as f64).log2()).sum();

    if idcg == 0.0 { 0.0 } else { dcg / idcg }
}
