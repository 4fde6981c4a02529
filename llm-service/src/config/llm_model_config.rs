use crate::config::llm_provider::LlmProvider;
use crate::error_handler::LlmError;

/// Configuration for one LLM model role.
///
/// This struct contains both general and provider-specific parameters and is
/// shared by the embedding, generation, and judge profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend (e.g., Ollama, OpenAI).
    pub provider: LlmProvider,

    /// Model identifier string (e.g., `"text-embedding-3-small"`, `"qwen3:14b"`).
    pub model: String,

    /// Inference endpoint (local server or remote API URL).
    pub endpoint: String,

    /// Optional API key for authentication (required for OpenAI).
    pub api_key: Option<String>,

    /// Maximum number of tokens to generate (generation/judge only).
    pub max_tokens: Option<u32>,

    /// Sampling temperature (generation/judge only).
    pub temperature: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Validates endpoint scheme and model name.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model.trim().is_empty() {
            return Err(LlmError::Config("model name must not be empty".into()));
        }
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(LlmError::Config(format!(
                "invalid endpoint `{}`: must start with http:// or https://",
                self.endpoint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "nomic-embed-text".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            timeout_secs: Some(30),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn bad_endpoint_rejected() {
        let mut cfg = base();
        cfg.endpoint = "localhost:11434".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_model_rejected() {
        let mut cfg = base();
        cfg.model = " ".into();
        assert!(cfg.validate().is_err());
    }
}
