//! Google Gemini provider

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DEFAULT_PRIORITY, ProviderConfig};
use crate::error::{ProviderError, check_response};
use crate::pricing::GEMINI_PRICING;
use crate::tokens::{estimate_prompt_tokens, estimate_tokens};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, ChatRole, ChatUsage, StreamChunk};

use super::{ChatStream, LlmProvider, REQUEST_TIMEOUT, http_client, sse};

const PROVIDER: &str = "gemini";

/// Google Gemini provider
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    priority: u32,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("base_url", &self.base_url)
            .field("priority", &self.priority)
            .finish()
    }
}

impl GoogleProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-1.5-flash";

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

    fn post(&self, model: &str, method: &str, body: &GeminiRequest) -> reqwest::RequestBuilder {
        let url = format!("{}/v1beta/models/{}:{}", self.base_url, model, method);
        let mut builder = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body);
        if method == "streamGenerateContent" {
            builder = builder.query(&[("alt", "sse")]);
        }
        builder
    }

    /// Failure reported inside a response body, if any
    fn body_error(resp: &GeminiApiResponse) -> Option<ProviderError> {
        let error = resp.error.as_ref()?;
        let message = match (&error.status, error.code) {
            (Some(status), _) => format!("{} ({})", error.message, status),
            (None, Some(code)) => format!("{} (code {})", error.message, code),
            (None, None) => error.message.clone(),
        };
        Some(ProviderError::stream(PROVIDER, message))
    }

    /// Convert a normalized request to Gemini wire format.
    ///
    /// Assistant turns become "model" turns; system messages move into
    /// `systemInstruction`.
    fn to_gemini_request(request: &ChatRequest, messages: &[ChatMessage]) -> GeminiRequest {
        let contents = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        ChatRole::Assistant => "model",
                        ChatRole::User | ChatRole::System => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        let system_parts: Vec<GeminiPart> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System && !m.content.is_empty())
            .map(|m| GeminiPart {
                text: Some(m.content.clone()),
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }

    /// Concatenated text of the first candidate
    fn candidate_text(resp: &GeminiApiResponse) -> Option<String> {
        let candidate = resp.candidates.first()?;
        let content = candidate.content.as_ref()?;
        Some(
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>(),
        )
    }

    /// Convert Gemini response to provider-agnostic format
    fn from_gemini_response(
        resp: GeminiApiResponse,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatResponse, ProviderError> {
        let text = Self::candidate_text(&resp)
            .ok_or_else(|| ProviderError::invalid_response(PROVIDER, "response had no candidates"))?;

        let usage = match resp.usage_metadata {
            Some(u) => {
                let prompt_tokens = u.prompt_token_count.unwrap_or(0);
                let completion_tokens = u.candidates_token_count.unwrap_or(0);
                ChatUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: u
                        .total_token_count
                        .unwrap_or(prompt_tokens.saturating_add(completion_tokens)),
                }
            }
            None => ChatUsage::new(estimate_prompt_tokens(messages), estimate_tokens(&text)),
        };

        let cost = GEMINI_PRICING.estimate_cost(model, usage.prompt_tokens, usage.completion_tokens);

        Ok(ChatResponse {
            text,
            usage,
            cost,
            provider: PROVIDER.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model_or(Self::DEFAULT_MODEL);
        let messages = request.conversation();
        let body = Self::to_gemini_request(request, &messages);

        debug!(
            "Gemini request: model={}, contents={}",
            model,
            body.contents.len()
        );

        let response = self
            .post(model, "generateContent", &body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let response = check_response(PROVIDER, response).await?;

        let api_response: GeminiApiResponse = response
            .json()
            .await
            .map_err(|e| {
                ProviderError::invalid_response(PROVIDER, e.without_url().to_string())
            })?;

        debug!(
            "Gemini response: candidates={}",
            api_response.candidates.len()
        );

        Self::from_gemini_response(api_response, model, &messages)
    }

    fn chat_stream(&self, request: &ChatRequest) -> ChatStream {
        let model = request.model_or(Self::DEFAULT_MODEL).to_string();
        let messages = request.conversation();
        let prompt_tokens = estimate_prompt_tokens(&messages);
        let http = self.post(
            &model,
            "streamGenerateContent",
            &Self::to_gemini_request(request, &messages),
        );

        Box::pin(try_stream! {
            debug!("Gemini stream request: model={}", model);
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
                let chunk = match serde_json::from_str::<GeminiApiResponse>(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!("Failed to parse Gemini stream chunk: {} ({})", e, data);
                        continue;
                    }
                };
                if let Some(error) = Self::body_error(&chunk) {
                    Err::<(), _>(error)?;
                }
                let text = Self::candidate_text(&chunk).unwrap_or_default();
                if text.is_empty() {
                    continue;
                }
                output.push_str(&text);
                let cost_so_far =
                    GEMINI_PRICING.estimate_cost(&model, prompt_tokens, estimate_tokens(&output));
                yield StreamChunk {
                    text,
                    cost_so_far,
                    provider: PROVIDER.to_string(),
                };
            }
        })
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}
