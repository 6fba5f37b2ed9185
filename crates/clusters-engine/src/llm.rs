//! LLM completion clients.
//!
//! [`ApiLlmClient`] talks to OpenAI-compatible or Anthropic endpoints with
//! exponential-backoff retries. [`NoOpLlmClient`] always fails, which sends
//! callers down their fallback path.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use clusters_types::LlmSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::EngineError;

/// Text completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String, EngineError>;
}

/// Configuration for [`ApiLlmClient`].
#[derive(Debug, Clone)]
pub struct ApiLlmConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "gpt-4o-mini", "claude-3-haiku-20240307")
    pub model: String,

    pub api_key: SecretString,

    /// Per-request timeout
    pub timeout: Duration,

    /// Total attempts including the first
    pub max_retries: u32,

    /// Upper bound on time spent retrying
    pub max_elapsed: Duration,
}

impl ApiLlmConfig {
    /// Build from settings; `None` when no API key is configured.
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        let api_key = settings.api_key.as_ref().filter(|k| !k.trim().is_empty())?;
        Some(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: SecretString::from(api_key.clone()),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries.max(1),
            max_elapsed: Duration::from_secs(settings.timeout_secs * 2),
        })
    }
}

/// HTTP LLM client.
pub struct ApiLlmClient {
    client: Client,
    config: ApiLlmConfig,
}

impl ApiLlmClient {
    pub fn new(config: ApiLlmConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiLlmConfig {
        &self.config
    }

    /// Call the API with retry logic.
    async fn call_api(&self, prompt: &str) -> Result<String, EngineError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.config.max_elapsed),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.config.model, "Calling LLM API");

            match self.make_request(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "LLM call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn make_request(&self, prompt: &str) -> Result<String, EngineError> {
        if self.config.base_url.contains("anthropic") {
            self.make_anthropic_request(prompt).await
        } else {
            self.make_openai_request(prompt).await
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Llm(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    /// OpenAI-compatible chat completion.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, EngineError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: String,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            messages: vec![OpenAIMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Llm(e.to_string()))?;

        let body: OpenAIResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Parse("No choices in response".to_string()))
    }

    /// Anthropic messages API.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, EngineError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: 256,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Llm(e.to_string()))?;

        let body: AnthropicResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        body.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| EngineError::Parse("No content in response".to_string()))
    }
}

#[async_trait]
impl LlmClient for ApiLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, EngineError> {
        self.call_api(prompt).await
    }
}

/// A client that always fails, forcing fallback paths.
pub struct NoOpLlmClient;

#[async_trait]
impl LlmClient for NoOpLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String, EngineError> {
        Err(EngineError::Config("No LLM configured".to_string()))
    }
}
