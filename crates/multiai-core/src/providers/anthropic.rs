//! Anthropic Claude provider

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_PRIORITY, ProviderConfig};
use crate::error::{ProviderError, check_response};
use crate::pricing::ANTHROPIC_PRICING;
use crate::tokens::{estimate_prompt_tokens, estimate_tokens};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatUsage, StreamChunk};

use super::{ChatStream, LlmProvider, REQUEST_TIMEOUT, http_client, sse};

const PROVIDER: &str = "anthropic";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    priority: u32,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("priority", &self.priority)
            .finish()
    }
}

impl AnthropicProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    pub const DEFAULT_MODEL: &'static str = "claude-3-5-sonnet-20240620";
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;
    pub const API_VERSION: &'static str = "2023-06-01";

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

    fn post(&self, body: &AnthropicRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(body)
    }

    /// Convert a normalized request to Anthropic wire format.
    ///
    /// Anthropic wants system prompts as a separate field, not a message.
    fn to_anthropic_request(
        request: &ChatRequest,
        model: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> AnthropicRequest {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .collect();

        AnthropicRequest {
            model: model.to_string(),
            max_tokens: request.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| AnthropicMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    /// Convert Anthropic response to provider-agnostic format
    fn from_anthropic_response(resp: AnthropicApiResponse, model: &str) -> ChatResponse {
        let text = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let usage = ChatUsage::new(resp.usage.input_tokens, resp.usage.output_tokens);
        let cost =
            ANTHROPIC_PRICING.estimate_cost(model, usage.prompt_tokens, usage.completion_tokens);

        ChatResponse {
            text,
            usage,
            cost,
            provider: PROVIDER.to_string(),
            model: model.to_string(),
        }
    }

    /// Text delta carried by one stream event, if any
    fn delta_text(event: AnthropicStreamEvent) -> Result<Option<String>, ProviderError> {
        match event {
            AnthropicStreamEvent::ContentBlockDelta { delta } => Ok(delta
                .text
                .filter(|t| delta.kind == "text_delta" && !t.is_empty())),
            AnthropicStreamEvent::Error { error } => {
                Err(ProviderError::stream(PROVIDER, error.message))
            }
            AnthropicStreamEvent::Other => Ok(None),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model_or(Self::DEFAULT_MODEL);
        let messages = request.conversation();
        let body = Self::to_anthropic_request(request, model, &messages, false);

        debug!(
            "Anthropic request: model={}, messages={}",
            model,
            body.messages.len()
        );

        let response = self
            .post(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let response = check_response(PROVIDER, response).await?;

        let api_response: AnthropicApiResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::invalid_response(PROVIDER, e.without_url().to_string())
            })?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Ok(Self::from_anthropic_response(api_response, model))
    }

    fn chat_stream(&self, request: &ChatRequest) -> ChatStream {
        let model = request.model_or(Self::DEFAULT_MODEL).to_string();
        let messages = request.conversation();
        let prompt_tokens = estimate_prompt_tokens(&messages);
        let http = self.post(&Self::to_anthropic_request(request, &model, &messages, true));

        Box::pin(try_stream! {
            debug!("Anthropic stream request: model={}", model);
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
                let event = match serde_json::from_str::<AnthropicStreamEvent>(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("Failed to parse Anthropic SSE event: {} ({})", e, data);
                        continue;
                    }
                };
                if let Some(text) = Self::delta_text(event)? {
                    output.push_str(&text);
                    let cost_so_far = ANTHROPIC_PRICING.estimate_cost(
                        &model,
                        prompt_tokens,
                        estimate_tokens(&output),
                    );
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

// ── Anthropic wire types ──

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicApiResponse {
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// The SSE events we act on; everything else (message_start, ping, ...) is `Other`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    Error {
        error: AnthropicErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicDelta {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}
