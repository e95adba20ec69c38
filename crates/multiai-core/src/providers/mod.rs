//! Multi-provider LLM abstraction layer
//!
//! Supports OpenAI, Anthropic and Google Gemini. Providers implement the
//! [`LlmProvider`] trait and are composed via [`crate::ModelRouter`] for
//! ordered fallback. Each adapter is also usable on its own.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod sse;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::Client;

use crate::config::{DEFAULT_PRIORITY, ProviderConfig, ProviderKind};
use crate::error::{ProviderError, UnsupportedProviderError};
use crate::types::{ChatRequest, ChatResponse, StreamChunk};

use anthropic::AnthropicProvider;
use google::GoogleProvider;
use openai::OpenAiProvider;

/// Lazy, single-pass sequence of chunks from one provider.
///
/// Nothing is sent until the stream is first polled. Dropping it closes the
/// underlying connection.
pub type ChatStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Timeout for a whole single-shot round trip
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Trait that all LLM providers implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name (e.g. "openai"), used for cost bucketing and alias lookup
    fn provider_name(&self) -> &str;

    /// Router ordering; lower is tried first
    fn priority(&self) -> u32 {
        DEFAULT_PRIORITY
    }

    /// One blocking round trip
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Stream the completion as text deltas with a running cost estimate.
    ///
    /// Failures before the first chunk arrive as the first item; failures
    /// after it arrive in place of the next chunk.
    fn chat_stream(&self, request: &ChatRequest) -> ChatStream;
}

/// Build the adapter a configuration entry names
pub fn build_provider(
    config: &ProviderConfig,
) -> Result<Box<dyn LlmProvider>, UnsupportedProviderError> {
    let provider: Box<dyn LlmProvider> = match config.kind()? {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::from_config(config)),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::from_config(config)),
        ProviderKind::Gemini => Box::new(GoogleProvider::from_config(config)),
    };
    Ok(provider)
}

pub(crate) fn http_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}
