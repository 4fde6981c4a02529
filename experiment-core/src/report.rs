//! Result artifacts: summary JSON, per-query detailed JSONL, per-sample
//! generation JSONL.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::errors::Result;
use crate::evaluate::EvaluationSummary;
use crate::record::{QueryOutcome, QueryRecord, SampledQuery};

/// Run identity block of the summary artifact.
#[derive(Clone, Debug, Serialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub description: String,
    pub experiment_id: String,
    /// RFC3339 completion timestamp.
    pub timestamp: String,
    pub duration_seconds: f64,
}

/// Aggregate summary of one run.
#[derive(Clone, Debug, Serialize)]
pub struct SummaryReport {
    pub experiment_info: ExperimentInfo,
    /// Full configuration echo, for reproducibility.
    pub config: serde_json::Value,
    pub aggregate_metrics: BTreeMap<String, f64>,
    pub document_count: usize,
    pub passage_count: usize,
    pub query_count: usize,
    pub evaluated_count: usize,
    pub failed_count: usize,
    /// Whether embeddings came from the cache instead of the provider.
    pub cache_hit: bool,
}

/// One detailed retrieval row (JSONL).
#[derive(Clone, Debug, Serialize)]
pub struct DetailedRecord {
    pub query_id: String,
    pub ground_truth_count: usize,
    pub retrieved_count: usize,
    pub retrieved_doc_ids: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One generation/judge row (JSONL).
#[derive(Clone, Debug, Serialize)]
pub struct GenerationRecord {
    pub query_id: String,
    pub profile_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_scores: Option<BTreeMap<String, u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationRecord {
    pub fn from_sample(sample: &SampledQuery) -> Self {
        Self {
            query_id: sample.record.query_id.clone(),
            profile_key: sample.record.profile_key(),
            response: sample.response.clone(),
            judge_scores: sample.judge_scores.clone(),
            error: sample.error.clone(),
        }
    }
}

/// Joins queries, outcomes, and per-query metrics into detailed rows.
pub fn detailed_records(
    queries: &[QueryRecord],
    outcomes: &[QueryOutcome],
    evaluation: &EvaluationSummary,
) -> Vec<DetailedRecord> {
    let metrics_by_id: BTreeMap<&str, &BTreeMap<String, f64>> = evaluation
        .per_query
        .iter()
        .map(|q| (q.query_id.as_str(), &q.metrics))
        .collect();

    queries
        .iter()
        .zip(outcomes.iter())
        .map(|(query, outcome)| DetailedRecord {
            query_id: query.query_id.clone(),
            ground_truth_count: query.ground_truth.len(),
            retrieved_count: outcome.hits.len(),
            retrieved_doc_ids: outcome.retrieved_ids(),
            metrics: metrics_by_id
                .get(query.query_id.as_str())
                .map(|m| (*m).clone())
                .unwrap_or_default(),
            error: outcome.error.clone(),
        })
        .collect()
}

/// Writes the three artifacts under `<out_dir>/<experiment_name>/`.
pub struct ReportWriter {
    out_dir: PathBuf,
    experiment_id: String,
}

impl ReportWriter {
    /// # Errors
    /// Returns `ExperimentError::Io` when the output directory cannot be
    /// created.
    pub fn new(out_dir: impl Into<PathBuf>, experiment_id: impl Into<String>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            experiment_id: experiment_id.into(),
        })
    }

    /// Writes `results_<id>.json`.
    pub fn write_summary(&self, summary: &SummaryReport) -> Result<PathBuf> {
        let path = self.out_dir.join(format!("results_{}.json", self.experiment_id));
        let f = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(f, summary)?;
        info!("summary written to {}", path.display());
        Ok(path)
    }

    /// Writes `detailed_results_<id>.jsonl`.
    pub fn write_detailed(&self, rows: &[DetailedRecord]) -> Result<PathBuf> {
        let path = self
            .out_dir
            .join(format!("detailed_results_{}.jsonl", self.experiment_id));
        write_jsonl(&path, rows)?;
        info!("{} detailed rows written to {}", rows.len(), path.display());
        Ok(path)
    }

    /// Writes `generation_results_<id>.jsonl`.
    pub fn write_generation(&self, rows: &[GenerationRecord]) -> Result<PathBuf> {
        let path = self
            .out_dir
            .join(format!("generation_results_{}.jsonl", self.experiment_id));
        write_jsonl(&path, rows)?;
        info!("{} generation rows written to {}", rows.len(), path.display());
        Ok(path)
    }
}

fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut w, row)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::QueryEvaluation;
    use crate::record::RankedHit;
    use serde_json::Value;
    use std::io::BufRead;

    fn summary_fixture() -> SummaryReport {
        SummaryReport {
            experiment_info: ExperimentInfo {
                name: "baseline".into(),
                description: String::new(),
                experiment_id: "emb_x_chunk_y_retr_z".into(),
                timestamp: "2025-09-12T10:20:30Z".into(),
                duration_seconds: 12.5,
            },
            config: serde_json::json!({"retriever": {"top_k": 10}}),
            aggregate_metrics: BTreeMap::from([("recall@10".to_string(), 0.8)]),
            document_count: 3,
            passage_count: 9,
            query_count: 2,
            evaluated_count: 2,
            failed_count: 0,
            cache_hit: true,
        }
    }

    #[test]
    fn summary_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), "exp1").unwrap();
        let path = writer.write_summary(&summary_fixture()).unwrap();

        let parsed: Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed["aggregate_metrics"]["recall@10"], 0.8);
        assert_eq!(parsed["experiment_info"]["name"], "baseline");
        assert_eq!(parsed["cache_hit"], true);
    }

    #[test]
    fn detailed_rows_are_one_json_per_line() {
        let queries = vec![QueryRecord {
            query_id: "q1".into(),
            text: "query".into(),
            profile: Value::Null,
            ground_truth: vec!["a".into(), "b".into()],
        }];
        let outcomes = vec![QueryOutcome::ok(
            "q1",
            vec![RankedHit {
                doc_id: "a".into(),
                score: 0.9,
                text: None,
            }],
        )];
        let evaluation = EvaluationSummary {
            per_query: vec![QueryEvaluation {
                query_id: "q1".into(),
                metrics: BTreeMap::from([("recall@1".to_string(), 0.5)]),
            }],
            aggregate: BTreeMap::new(),
            evaluated: 1,
            failed: 0,
        };

        let rows = detailed_records(&queries, &outcomes, &evaluation);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ground_truth_count, 2);
        assert_eq!(rows[0].retrieved_doc_ids, vec!["a"]);

        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path(), "exp1").unwrap();
        let path = writer.write_detailed(&rows).unwrap();

        let lines: Vec<String> = std::io::BufReader::new(File::open(path).unwrap())
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        let parsed: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed["metrics"]["recall@1"], 0.5);
    }

    #[test]
    fn failed_sample_serializes_its_error_marker() {
        let sample = SampledQuery {
            record: QueryRecord {
                query_id: "q9".into(),
                text: "query".into(),
                profile: serde_json::json!({"major": "cs"}),
                ground_truth: vec![],
            },
            response: None,
            judge_scores: None,
            error: Some("generation failed: timeout".into()),
        };
        let row = GenerationRecord::from_sample(&sample);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["query_id"], "q9");
        assert!(json.get("response").is_none());
        assert_eq!(json["error"], "generation failed: timeout");
    }
}
