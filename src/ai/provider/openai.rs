//! OpenAI API Provider
//!
//! Adapter for OpenAI's Chat Completions API. All backend failure modes are
//! classified into retryable/fatal at this boundary: 429 and 5xx statuses
//! and transport timeouts are retryable, auth and request errors are fatal.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ModelProvider, ProviderResponse, SamplingParams, TokenUsage};
use crate::ai::prompt::PromptEnvelope;
use crate::config::LlmConfig;
use crate::types::{CvError, ProviderError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER_NAME: &str = "openai";

/// OpenAI provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CvError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CvError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            client,
        })
    }

    fn build_request(&self, envelope: &PromptEnvelope, params: SamplingParams) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: format!("{}\n\n{}", envelope.role, envelope.instructions),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: envelope.body.clone(),
                },
            ],
            temperature: params.temperature,
            max_tokens: Some(params.max_tokens),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn raw_generate(
        &self,
        envelope: &PromptEnvelope,
        params: SamplingParams,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        info!(model = %self.model, kind = ?envelope.kind, "calling OpenAI");

        let request = self.build_request(envelope, params);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::classify_transport(&e, PROVIDER_NAME))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            let mut err = ProviderError::classify_http_status(
                status.as_u16(),
                format!("OpenAI API error ({}): {}", status, body),
                PROVIDER_NAME,
            );
            if let Some(wait) = retry_after {
                err = err.with_retry_after(wait);
            }
            return Err(err);
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            // A garbled success body is a server-side glitch; let it retry.
            ProviderError::retryable(
                PROVIDER_NAME,
                format!("Failed to parse OpenAI response: {}", e),
            )
        })?;

        let usage = body
            .usage
            .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::retryable(PROVIDER_NAME, "No content in OpenAI response")
            })?;

        debug!(tokens = usage.total(), "OpenAI response received");
        Ok(ProviderResponse {
            text,
            provider: PROVIDER_NAME.to_string(),
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/models", self.api_base);
        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("OpenAI API check failed: {}", resp.status());
                false
            }
            Err(e) => {
                warn!("OpenAI API check failed: {}", e);
                false
            }
        }
    }
}

/// Parse a `Retry-After: <seconds>` header, capped to a sane maximum.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: u64 = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    Some(Duration::from_secs(
        secs.min(crate::constants::retry::MAX_RETRY_AFTER_SECS),
    ))
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}
