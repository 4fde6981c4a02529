use crate::error_handler::LlmError;

/// Represents the provider (backend) used for LLM inference and embeddings.
///
/// Adding more providers in the future (e.g., Anthropic, Mistral API)
/// can be done by extending this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime for on-device inference.
    Ollama,
    /// OpenAI REST API.
    OpenAI,
}

impl LlmProvider {
    /// Parses a provider name from configuration.
    pub fn parse(s: &str) -> Result<Self, LlmError> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(LlmError::Config(format!("unsupported provider: {other}"))),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAI => f.write_str("openai"),
        }
    }
}
