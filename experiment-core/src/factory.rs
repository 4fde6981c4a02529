//! Component factory: strategy name → concrete implementation.
//!
//! The registry is explicit and constructed at startup (dependency
//! injection) — there is no process-wide mutable registration. Unknown
//! names abort the run with [`ExperimentError::UnknownStrategy`] before any
//! remote call is made; there is deliberately no silent default.

use std::collections::HashMap;
use std::sync::Arc;

use llm_service::{LlmServiceProfiles, RetryPolicy};
use vector_store::{DistanceKind, StoreConfig};

use crate::chunking::{Chunker, FixedChunker, NoChunker, RecursiveChunker, TokenChunker};
use crate::config::{ChunkerConfig, EmbedderConfig, RetrieverConfig};
use crate::embedding::{Embedder, EmbeddingsProvider, ProfileEmbedder};
use crate::errors::{ExperimentError, Result};
use crate::retrieval::{QdrantRetriever, Retriever};

type EmbedderBuilder =
    Box<dyn Fn(&EmbedderConfig) -> Result<Arc<dyn EmbeddingsProvider>> + Send + Sync>;
type ChunkerBuilder = Box<dyn Fn(&ChunkerConfig) -> Result<Arc<dyn Chunker>> + Send + Sync>;
type RetrieverBuilder =
    Box<dyn Fn(&RetrieverConfig, Arc<Embedder>) -> Result<Arc<dyn Retriever>> + Send + Sync>;

/// Explicit registry of strategy builders for the three pluggable roles.
pub struct ComponentRegistry {
    embedders: HashMap<String, EmbedderBuilder>,
    chunkers: HashMap<String, ChunkerBuilder>,
    retrievers: HashMap<String, RetrieverBuilder>,
}

impl ComponentRegistry {
    /// A registry with nothing registered; useful for tests and embedding
    /// the harness with a custom strategy set.
    pub fn empty() -> Self {
        Self {
            embedders: HashMap::new(),
            chunkers: HashMap::new(),
            retrievers: HashMap::new(),
        }
    }

    /// The standard registry: `ollama`/`openai` embedders, the four
    /// chunking strategies, and the `qdrant` retriever.
    pub fn standard(svc: Arc<LlmServiceProfiles>, retry: RetryPolicy) -> Self {
        let mut reg = Self::empty();

        for name in ["ollama", "openai"] {
            let svc = svc.clone();
            reg.register_embedder(name, move |_cfg: &EmbedderConfig| {
                let provider: Arc<dyn EmbeddingsProvider> =
                    Arc::new(ProfileEmbedder::new(svc.clone(), retry));
                Ok(provider)
            });
        }

        reg.register_chunker("no_chunk", |_cfg| {
            let chunker: Arc<dyn Chunker> = Arc::new(NoChunker);
            Ok(chunker)
        });
        reg.register_chunker("fixed", |cfg| {
            let (size, overlap) = size_overlap(cfg);
            let chunker: Arc<dyn Chunker> = Arc::new(FixedChunker::new(size, overlap)?);
            Ok(chunker)
        });
        reg.register_chunker("recursive", |cfg| {
            let (size, overlap) = size_overlap(cfg);
            let chunker: Arc<dyn Chunker> = Arc::new(RecursiveChunker::new(size, overlap)?);
            Ok(chunker)
        });
        reg.register_chunker("token", |cfg| {
            let (size, overlap) = size_overlap(cfg);
            let path = cfg
                .params
                .get("tokenizer_path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ExperimentError::config(
                        "chunker.params.tokenizer_path",
                        "required for the `token` strategy",
                    )
                })?;
            let chunker: Arc<dyn Chunker> = Arc::new(TokenChunker::new(size, overlap, path)?);
            Ok(chunker)
        });

        reg.register_retriever("qdrant", |cfg, embedder| {
            let mut store_cfg = StoreConfig::new_default(cfg.url.clone(), cfg.collection.clone());
            store_cfg.distance = DistanceKind::parse(&cfg.distance)?;
            store_cfg.upsert_batch = cfg.upsert_batch;
            store_cfg.on_disk = cfg.on_disk;
            store_cfg.api_key = cfg
                .api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok());
            let retriever: Arc<dyn Retriever> =
                Arc::new(QdrantRetriever::new(store_cfg, embedder)?);
            Ok(retriever)
        });

        reg
    }

    pub fn register_embedder<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&EmbedderConfig) -> Result<Arc<dyn EmbeddingsProvider>> + Send + Sync + 'static,
    {
        self.embedders.insert(name.into(), Box::new(f));
    }

    pub fn register_chunker<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&ChunkerConfig) -> Result<Arc<dyn Chunker>> + Send + Sync + 'static,
    {
        self.chunkers.insert(name.into(), Box::new(f));
    }

    pub fn register_retriever<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&RetrieverConfig, Arc<Embedder>) -> Result<Arc<dyn Retriever>> + Send + Sync + 'static,
    {
        self.retrievers.insert(name.into(), Box::new(f));
    }
}

/// Defaults follow the original recursive splitter (1000/200).
fn size_overlap(cfg: &ChunkerConfig) -> (usize, usize) {
    (
        cfg.chunk_size.unwrap_or(1000),
        cfg.chunk_overlap.unwrap_or(200),
    )
}

/// Resolves configured strategy names against a [`ComponentRegistry`].
pub struct ComponentFactory {
    registry: ComponentRegistry,
}

impl ComponentFactory {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self { registry }
    }

    /// # Errors
    /// [`ExperimentError::UnknownStrategy`] when no embedder is registered
    /// under `cfg.type`.
    pub fn resolve_embedder(&self, cfg: &EmbedderConfig) -> Result<Arc<dyn EmbeddingsProvider>> {
        let builder = self.registry.embedders.get(&cfg.r#type).ok_or_else(|| {
            ExperimentError::UnknownStrategy {
                role: "embedder",
                name: cfg.r#type.clone(),
            }
        })?;
        builder(cfg)
    }

    /// # Errors
    /// [`ExperimentError::UnknownStrategy`] when no chunker is registered
    /// under `cfg.type`.
    pub fn resolve_chunker(&self, cfg: &ChunkerConfig) -> Result<Arc<dyn Chunker>> {
        let builder = self.registry.chunkers.get(&cfg.r#type).ok_or_else(|| {
            ExperimentError::UnknownStrategy {
                role: "chunker",
                name: cfg.r#type.clone(),
            }
        })?;
        builder(cfg)
    }

    /// # Errors
    /// [`ExperimentError::UnknownStrategy`] when no retriever is registered
    /// under `cfg.type`.
    pub fn resolve_retriever(
        &self,
        cfg: &RetrieverConfig,
        embedder: Arc<Embedder>,
    ) -> Result<Arc<dyn Retriever>> {
        let builder = self.registry.retrievers.get(&cfg.r#type).ok_or_else(|| {
            ExperimentError::UnknownStrategy {
                role: "retriever",
                name: cfg.r#type.clone(),
            }
        })?;
        builder(cfg, embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_service::{LlmModelConfig, LlmProvider};
    use std::collections::BTreeMap;

    fn svc() -> Arc<LlmServiceProfiles> {
        let embedding = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "nomic-embed-text".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            timeout_secs: Some(5),
        };
        Arc::new(LlmServiceProfiles::new(embedding, None, None).unwrap())
    }

    fn factory() -> ComponentFactory {
        ComponentFactory::new(ComponentRegistry::standard(svc(), RetryPolicy::default()))
    }

    fn chunker_cfg(r#type: &str, size: Option<usize>, overlap: Option<usize>) -> ChunkerConfig {
        ChunkerConfig {
            r#type: r#type.into(),
            chunk_size: size,
            chunk_overlap: overlap,
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn unknown_chunker_names_the_role_and_strategy() {
        let err = factory()
            .resolve_chunker(&chunker_cfg("semantic", None, None))
            .err().unwrap();
        match err {
            ExperimentError::UnknownStrategy { role, name } => {
                assert_eq!(role, "chunker");
                assert_eq!(name, "semantic");
            }
            other => panic!("expected UnknownStrategy, got {other}"),
        }
    }

    #[test]
    fn unknown_embedder_is_rejected() {
        let cfg = EmbedderConfig {
            r#type: "opnai".into(),
            model_name: "text-embedding-3-small".into(),
            batch_size: 16,
            concurrency: 4,
            endpoint: None,
            api_key_env: None,
            timeout_secs: None,
            params: BTreeMap::new(),
        };
        let err = factory().resolve_embedder(&cfg).err().unwrap();
        assert!(matches!(
            err,
            ExperimentError::UnknownStrategy { role: "embedder", .. }
        ));
    }

    #[test]
    fn known_chunkers_resolve() {
        let f = factory();
        assert_eq!(
            f.resolve_chunker(&chunker_cfg("no_chunk", None, None))
                .unwrap()
                .id(),
            "no_chunk"
        );
        assert_eq!(
            f.resolve_chunker(&chunker_cfg("recursive", Some(500), Some(100)))
                .unwrap()
                .id(),
            "recursive"
        );
        assert_eq!(
            f.resolve_chunker(&chunker_cfg("fixed", Some(500), Some(100)))
                .unwrap()
                .id(),
            "fixed"
        );
    }

    #[test]
    fn invalid_chunk_params_surface_as_config_error() {
        let err = factory()
            .resolve_chunker(&chunker_cfg("recursive", Some(100), Some(100)))
            .err().unwrap();
        assert!(matches!(err, ExperimentError::Config { .. }));
    }

    #[test]
    fn token_chunker_requires_tokenizer_path() {
        let err = factory()
            .resolve_chunker(&chunker_cfg("token", Some(100), Some(10)))
            .err().unwrap();
        assert!(matches!(err, ExperimentError::Config { ref field, .. }
            if field == "chunker.params.tokenizer_path"));
    }

    #[test]
    fn registered_embedder_resolves() {
        let cfg = EmbedderConfig {
            r#type: "ollama".into(),
            model_name: "nomic-embed-text".into(),
            batch_size: 16,
            concurrency: 4,
            endpoint: None,
            api_key_env: None,
            timeout_secs: None,
            params: BTreeMap::new(),
        };
        let provider = factory().resolve_embedder(&cfg).unwrap();
        assert_eq!(provider.id(), "nomic-embed-text");
    }
}
