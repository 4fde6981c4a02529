//! Configuration loader and validator.
//!
//! Responsibilities:
//! - Read the experiment YAML file into [`ExperimentConfig`]
//! - Apply defaults for optional sections
//! - Validate constraints (e.g. chunk_overlap < chunk_size) before any
//!   component is built

pub mod model;

pub use model::{
    ChunkerConfig, DataConfig, EmbedderConfig, EvaluationConfig, ExperimentConfig, JudgeConfig,
    LlmSection, RetrieverConfig,
};

use std::path::Path;

use tracing::info;

use crate::errors::{ExperimentError, Result};

/// Loads and validates an [`ExperimentConfig`] from a YAML file.
///
/// # Errors
/// Returns `ExperimentError::Io` when the file cannot be read,
/// `ExperimentError::Config` on YAML or constraint violations.
pub fn load(path: impl AsRef<Path>) -> Result<ExperimentConfig> {
    let path = path.as_ref();
    info!("Loading experiment config from {:?}", path);

    let raw = std::fs::read_to_string(path)?;
    let cfg: ExperimentConfig = serde_yml::from_str(&raw)
        .map_err(|e| ExperimentError::config(path.display().to_string(), e.to_string()))?;

    cfg.validate()?;
    info!(
        "Config loaded: experiment `{}` ({})",
        cfg.experiment_name,
        cfg.experiment_id()
    );
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
experiment_name: baseline
embedder:
  type: ollama
  model_name: nomic-embed-text
chunker:
  type: recursive
  chunk_size: 500
  chunk_overlap: 100
retriever:
  type: qdrant
data:
  source_locations: ["data/docs.jsonl"]
  query_set_path: data/queries.jsonl
"#;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let f = write_tmp(MINIMAL);
        let cfg = load(f.path()).unwrap();
        assert_eq!(cfg.retriever.top_k, 10);
        assert_eq!(cfg.evaluation.k_values, vec![1, 3, 5, 10]);
        assert_eq!(cfg.embedder.batch_size, 16);
        assert!(!cfg.judge.enabled);
        assert_eq!(
            cfg.experiment_id(),
            "emb_nomic_embed_text_chunk_recursive_retr_qdrant"
        );
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let bad = MINIMAL.replace("chunk_overlap: 100", "chunk_overlap: 500");
        let f = write_tmp(&bad);
        let err = load(f.path()).unwrap_err();
        assert!(matches!(err, ExperimentError::Config { ref field, .. }
            if field == "chunker.chunk_overlap"));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let bad = MINIMAL.replace("type: qdrant", "type: qdrant\n  top_k: 0");
        let f = write_tmp(&bad);
        assert!(load(f.path()).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ExperimentError::Io(_)));
    }
}
