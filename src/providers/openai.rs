//! Client for OpenAI-compatible chat completion endpoints.
//!
//! Works against any server exposing `POST {base_url}/chat/completions`
//! with the OpenAI request/response shape (OpenAI, OpenRouter, DeepSeek,
//! Groq, Ollama's compatibility layer, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{SYSTEM_PROMPT, build_prompt, parse_story_payload};
use super::traits::CompletionProvider;
use crate::types::{Continuation, GenerationRequest, Usage};
use crate::{HuginnError, Result};

/// Story-continuation client for OpenAI-compatible APIs.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiCompatibleClient {
    /// Create a client for `base_url` (e.g. `https://openrouter.ai/api/v1`).
    ///
    /// `api_key` is sent as a bearer token when present; local servers
    /// usually need none.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_http_client(base_url, api_key, model, Client::new())
    }

    /// Create a client sharing an existing `reqwest::Client`.
    pub fn with_http_client(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        http: Client,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Cap completion length.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate one continuation.
    pub async fn complete(&self, request: &GenerationRequest) -> Result<Continuation> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = build_prompt(request);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                WireMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self.http.post(&url).json(&body).timeout(request.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;
        let response = self.check_status(response).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(HuginnError::EmptyResponse)?;

        let mut continuation = parse_story_payload(&content)?;
        if let Some(usage) = completion.usage {
            continuation.usage = Some(usage.into());
        }
        debug!(
            model = %self.model,
            choices = continuation.next_choices.len(),
            tokens = ?continuation.total_tokens(),
            "continuation generated"
        );
        Ok(continuation)
    }

    /// Check response status and map to appropriate error.
    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 | 403 => Err(HuginnError::AuthenticationFailed),
            404 => Err(HuginnError::ModelNotFound(self.model.clone())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(HuginnError::RateLimited { retry_after })
            }
            code => {
                let detail = response.text().await.unwrap_or_default();
                let message = match detail.trim() {
                    "" => status.to_string(),
                    text => text.chars().take(200).collect(),
                };
                Err(HuginnError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> HuginnError {
    if err.is_timeout() {
        HuginnError::Timeout(timeout)
    } else if err.is_decode() {
        HuginnError::MalformedResponse(err.to_string())
    } else {
        HuginnError::Http(err.to_string())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        let mut usage = Usage::new(wire.prompt_tokens, wire.completion_tokens);
        if let Some(total) = wire.total_tokens {
            usage.total_tokens = total;
        }
        usage
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Continuation> {
        self.complete(request).await
    }
}
