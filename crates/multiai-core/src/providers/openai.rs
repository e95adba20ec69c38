//! OpenAI provider (GPT-4o, GPT-3.5, etc.)

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{DEFAULT_PRIORITY, ProviderConfig};
use crate::error::{ProviderError, check_response};
use crate::pricing::OPENAI_PRICING;
use crate::tokens::{estimate_prompt_tokens, estimate_tokens};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ChatUsage, StreamChunk};

use super::{ChatStream, LlmProvider, REQUEST_TIMEOUT, http_client, sse};

const PROVIDER: &str = "openai";

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    priority: u32,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("priority", &self.priority)
            .finish()
    }
}

impl OpenAiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        let mut provider = Self::new(config.api_key.clone());
        if let Some(base_url) = &config.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
        if let Some(priority) = config.priority {
            provider = provider.with_priority(priority);
        }
        provider
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Convert a normalized request to OpenAI wire format
    fn to_openai_request(
        request: &ChatRequest,
        model: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> OpenAiRequest {
        OpenAiRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    /// Convert OpenAI response to provider-agnostic format
    fn from_openai_response(
        resp: OpenAiApiResponse,
        requested_model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "response had no choices"))?;

        let text = choice.message.content.unwrap_or_default();

        let usage = match resp.usage {
            Some(u) => ChatUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            },
            None => ChatUsage::new(estimate_prompt_tokens(messages), estimate_tokens(&text)),
        };

        // The reported model is usually a dated snapshot of the requested one
        let model = resp
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string());
        let cost =
            OPENAI_PRICING.estimate_cost(&model, usage.prompt_tokens, usage.completion_tokens);

        Ok(ChatResponse {
            text,
            usage,
            cost,
            provider: PROVIDER.to_string(),
            model,
        })
    }

    /// Text delta carried by one streamed chunk, if any
    fn delta_text(chunk: OpenAiStreamChunk) -> Result<Option<String>, ProviderError> {
        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::stream(PROVIDER, message));
        }
        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = request.model_or(Self::DEFAULT_MODEL);
        let messages = request.conversation();
        let body = Self::to_openai_request(request, model, &messages, false);

        debug!(
            "OpenAI request: model={}, messages={}",
            model,
            body.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let response = check_response(PROVIDER, response).await?;

        let api_response: OpenAiApiResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::invalid_response(PROVIDER, e.without_url().to_string())
            })?;

        debug!(
            "OpenAI response: choices={}, model={:?}",
            api_response.choices.len(),
            api_response.model
        );

        Self::from_openai_response(api_response, model, &messages)
    }

    fn chat_stream(&self, request: &ChatRequest) -> ChatStream {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = request.model_or(Self::DEFAULT_MODEL).to_string();
        let messages = request.conversation();
        let prompt_tokens = estimate_prompt_tokens(&messages);
        let http = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::to_openai_request(request, &model, &messages, true));

        Box::pin(try_stream! {
            debug!("OpenAI stream request: model={}", model);
            let response = http
                .send()
                .await
                .map_err(|e| ProviderError::request(PROVIDER, e))?;
            let response = check_response(PROVIDER, response).await?;

            let mut events = Box::pin(sse::data_events(response.bytes_stream()));
            let mut output = String::new();

            while let Some(data) = events.next().await {
                let data = data
                    .map_err(|e| ProviderError::stream(PROVIDER, e.without_url().to_string()))?;
                if data == "[DONE]" {
                    break;
                }
                let chunk = match serde_json::from_str::<OpenAiStreamChunk>(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!("Failed to parse OpenAI stream chunk: {} ({})", e, data);
                        continue;
                    }
                };
                if let Some(text) = Self::delta_text(chunk)? {
                    output.push_str(&text);
                    let cost_so_far =
                        OPENAI_PRICING.estimate_cost(&model, prompt_tokens, estimate_tokens(&output));
                    yield StreamChunk {
                        text,
                        cost_so_far,
                        provider: PROVIDER.to_string(),
                    };
                }
            }
        })
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Clone, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}
