//! Shared LLM service for the experiment harness.
//!
//! Wraps the two supported provider backends (Ollama, OpenAI) behind three
//! logical profiles — `embedding`, `generation`, and `judge` — with unified
//! errors, per-call timeouts, and bounded retry-with-backoff for transient
//! failures.

pub mod config;
pub mod error_handler;
pub mod judge;
pub mod retry;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::LlmError;
pub use retry::RetryPolicy;
pub use service_profiles::LlmServiceProfiles;
