//! Anthropic API client
//!
//! Every request is a single user turn. No conversation history is kept
//! between calls; the prompt carries all the context.

use crate::retry::RetryPolicy;
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, Completion, Model};
use pythia_core::config::BrainConfig;
use pythia_core::{PythiaError, Result};
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 8192;
const DEFAULT_TEMPERATURE: f32 = 0.4;
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Client for the Messages API
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    model: Model,
    max_tokens: usize,
    temperature: f32,
    retry: RetryPolicy,
}

impl AnthropicClient {
    /// Create a new client with default limits
    pub fn new(api_key: impl Into<String>, model: Model) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key: api_key.into(),
            api_url: ANTHROPIC_API_URL.to_string(),
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
        }
    }

    /// Build a client from the `[brain]` section
    pub fn from_config(api_key: impl Into<String>, config: &BrainConfig) -> Result<Self> {
        let model: Model = config.model.parse().map_err(PythiaError::Config)?;
        Ok(Self::new(api_key, model)
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
            .with_retry(RetryPolicy::from_config(config)))
    }

    /// Set max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point the client at a different endpoint (proxies, local gateways)
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send `prompt` and return the response text.
    ///
    /// HTTP 429 is retried up to the policy's attempt bound, waiting the
    /// policy delay or the server's `retry-after`, whichever is longer. Any
    /// other failure is returned immediately.
    pub async fn complete(&self, prompt: &str) -> Result<Completion> {
        let request = AnthropicRequest {
            model: self.model.api_name().to_string(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "Sending request to Anthropic API (attempt {}/{})",
                attempt,
                self.retry.max_attempts
            );

            let response = self
                .http
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| PythiaError::Backend(format!("Failed to send request: {}", e)))?;

            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);

                if !self.retry.should_retry(attempt) {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown".to_string());
                    return Err(PythiaError::RateLimited(format!(
                        "Rate limit exceeded after {} attempts. Last error: {}",
                        attempt, error_text
                    )));
                }

                let wait = self
                    .retry
                    .delay_for(attempt)
                    .max(retry_after.unwrap_or_default());

                tracing::warn!(
                    "Rate limited (429). Waiting {} seconds before attempt {}/{}",
                    wait.as_secs(),
                    attempt + 1,
                    self.retry.max_attempts
                );

                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown".to_string());
                return Err(PythiaError::Backend(format!(
                    "Anthropic API error {}: {}",
                    status, error_text
                )));
            }

            let anthropic_response: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| PythiaError::Backend(format!("Failed to parse response: {}", e)))?;

            let text = anthropic_response.text();
            if text.is_empty() {
                return Err(PythiaError::Backend("No content in response".to_string()));
            }

            match &anthropic_response.usage {
                Some(usage) => tracing::info!(
                    "Completion received ({} chars, {} input tokens, {} output tokens)",
                    text.len(),
                    usage.input_tokens,
                    usage.output_tokens
                ),
                None => tracing::info!("Completion received ({} chars)", text.len()),
            }

            return Ok(Completion {
                text,
                usage: anthropic_response.usage,
                attempts: attempt,
            });
        }
    }
}
