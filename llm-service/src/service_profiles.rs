//! Shared LLM service with three active profiles: `embedding`, `generation`,
//! and `judge`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - If the `judge` profile is not provided, it falls back to `generation`.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
};

use tokio::sync::RwLock;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::LlmError,
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// Shared service that manages the harness's three logical LLM roles.
///
/// Internally, it caches Ollama/OpenAI clients keyed by their configuration
/// to avoid recreating HTTP clients on each call.
pub struct LlmServiceProfiles {
    embedding: LlmModelConfig,
    generation: Option<LlmModelConfig>,
    judge: Option<LlmModelConfig>,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaService>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiService>>>,
}

impl LlmServiceProfiles {
    /// Creates a new service.
    ///
    /// - `embedding`: required embedding profile.
    /// - `generation`: optional generation profile (response synthesis).
    /// - `judge`: optional judge profile; falls back to `generation`.
    pub fn new(
        embedding: LlmModelConfig,
        generation: Option<LlmModelConfig>,
        judge: Option<LlmModelConfig>,
    ) -> Result<Self, LlmError> {
        embedding.validate()?;
        if let Some(cfg) = &generation {
            cfg.validate()?;
        }
        if let Some(cfg) = &judge {
            cfg.validate()?;
        }

        Ok(Self {
            embedding,
            generation,
            judge,
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
        })
    }

    /// Model identifier of the embedding profile (feeds cache-key derivation).
    pub fn embedding_model(&self) -> &str {
        &self.embedding.model
    }

    /// Computes embeddings for a batch of texts using the **embedding** profile.
    ///
    /// The batch either succeeds as a whole or fails as a whole; output order
    /// matches input order.
    ///
    /// # Errors
    /// Returns [`LlmError`] if the provider call fails.
    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        match self.embedding.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embed_batch(inputs).await
            }
            LlmProvider::OpenAI => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embed_batch(inputs).await
            }
        }
    }

    /// Generates text using the **generation** profile.
    ///
    /// # Errors
    /// Returns [`LlmError::Config`] when no generation profile was configured.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let cfg = self
            .generation
            .as_ref()
            .ok_or_else(|| LlmError::Config("no generation profile configured".into()))?;
        self.generate_with(cfg, prompt, system).await
    }

    /// Generates text using the **judge** profile.
    ///
    /// Falls back to the generation profile if no judge profile was specified
    /// at creation.
    pub async fn judge(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let cfg = self
            .judge
            .as_ref()
            .or(self.generation.as_ref())
            .ok_or_else(|| LlmError::Config("no judge or generation profile configured".into()))?;
        self.generate_with(cfg, prompt, system).await
    }

    /* --------------------- Internals --------------------- */

    async fn generate_with(
        &self,
        cfg: &LlmModelConfig,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        match cfg.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(cfg).await?;
                cli.generate(prompt).await
            }
            LlmProvider::OpenAI => {
                let cli = self.get_or_init_openai(cfg).await?;
                cli.generate(prompt, system).await
            }
        }
    }

    async fn get_or_init_ollama(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OllamaService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OllamaService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }

    async fn get_or_init_openai(
        &self,
        cfg: &LlmModelConfig,
    ) -> Result<Arc<OpenAiService>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.openai.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = Arc::new(OpenAiService::new(cfg.clone())?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, Eq)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

impl PartialEq for ClientKey {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.endpoint == other.endpoint
            && self.model == other.model
            && self.api_key == other.api_key
            && self.timeout == other.timeout
    }
}

impl Hash for ClientKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.endpoint.hash(state);
        self.model.hash(state);
        if let Some(ref k) = self.api_key {
            k.hash(state);
        } else {
            0usize.hash(state);
        }
        self.timeout.hash(state);
    }
}
