//! LLM Orchestration Layer
//!
//! Prompt construction, content-addressed response caching, and the provider
//! abstraction with retry/backoff.

pub mod cache;
pub mod generator;
pub mod prompt;
pub mod provider;

pub use cache::{CacheManager, fingerprint};
pub use generator::{Generator, RetryPolicy};
pub use prompt::{GrammaticalPerson, PromptBuilder, PromptEnvelope, PromptKind, ResumeContext};
pub use provider::{
    ModelProvider, OllamaProvider, OpenAiProvider, ProviderResponse, SamplingParams,
    SharedProvider, TokenUsage, create_provider,
};
