//! Model Provider Abstraction
//!
//! One capability — `raw_generate` — implemented per backend. Adapters are
//! stateless and interchangeable; selection is a single configuration-driven
//! construction step in `create_provider`, not runtime type inspection.
//!
//! Every adapter translates its backend's failure vocabulary into the two
//! abstract outcomes (`ProviderError::Retryable` / `ProviderError::Fatal`)
//! before an error escapes; the retry layer never sees a backend-specific
//! error type.

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::prompt::PromptEnvelope;
use crate::config::LlmConfig;
use crate::types::{CvError, ProviderError, Result};

// =============================================================================
// Provider Response
// =============================================================================

/// Token usage metrics, normalized across backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// From OpenAI-style usage fields.
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// From Ollama-style usage fields.
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }
}

/// Normalized provider result, independent of the originating SDK's response
/// shape. Serializable so it can live in the response cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Sampling parameters; part of the cache-key fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Shared provider handle for concurrent fan-out across pipeline stages.
pub type SharedProvider = Arc<dyn ModelProvider>;

/// One interchangeable LLM backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Perform the actual network request. This is the only part of the
    /// stack that can fail with backend-specific errors, and they must be
    /// classified before returning.
    async fn raw_generate(
        &self,
        envelope: &PromptEnvelope,
        params: SamplingParams,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Provider name for logging and cache keys
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check whether the backend is reachable
    async fn health_check(&self) -> bool;
}

/// Create a shared provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => Err(CvError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::from_openai(100, 50);
        assert_eq!(usage.total(), 150);
        assert_eq!(TokenUsage::from_ollama(10, 5).total(), 15);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "grok".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config),
            Err(CvError::Config(_))
        ));
    }

    #[test]
    fn test_ollama_provider_constructs_without_key() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_provider_response_round_trips_through_json() {
        let response = ProviderResponse {
            text: "generated".into(),
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            usage: TokenUsage::from_openai(12, 34),
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: ProviderResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
