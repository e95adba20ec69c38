//! Model router with ordered fallback across providers

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

use crate::aliases;
use crate::config::{ProviderConfig, RouterConfig};
use crate::cost::{CostStats, CostTracker};
use crate::error::{ProviderFailure, RouterError};
use crate::providers::{LlmProvider, build_provider};
use crate::types::{ChatRequest, ChatResponse, StreamChunk};

/// Routes chat requests across providers, falling back in priority order
pub struct ModelRouter {
    /// Providers in fallback order (index 0 = tried first)
    providers: Vec<Box<dyn LlmProvider>>,
    costs: CostTracker,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("providers", &self.provider_names())
            .field("costs", &self.costs)
            .finish()
    }
}

impl ModelRouter {
    /// Build adapters from configuration entries.
    ///
    /// Unsupported provider names are logged and skipped, so the router
    /// may end up with fewer providers than entries (or none at all).
    pub fn new(configs: &[ProviderConfig]) -> Self {
        let providers = configs
            .iter()
            .filter_map(|config| match build_provider(config) {
                Ok(provider) => Some(provider),
                Err(e) => {
                    warn!("Skipping provider entry: {}", e);
                    None
                }
            })
            .collect();
        Self::with_providers(providers)
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(&config.providers)
    }

    /// Use the given adapters, ordered by ascending priority.
    ///
    /// Equal priorities keep their given order.
    pub fn with_providers(mut providers: Vec<Box<dyn LlmProvider>>) -> Self {
        providers.sort_by_key(|p| p.priority());
        debug!(
            "Router initialized with {} providers: {:?}",
            providers.len(),
            providers.iter().map(|p| p.provider_name()).collect::<Vec<_>>()
        );
        Self {
            providers,
            costs: CostTracker::new(),
        }
    }

    /// Concrete model id for `alias` on the named provider; unknown aliases pass through
    pub fn resolve_model(&self, alias: &str, provider_name: &str) -> String {
        aliases::resolve_model(alias, provider_name)
    }

    /// Send a chat request, falling back to the next provider on error
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, RouterError> {
        let mut failures = Vec::new();

        for (idx, provider) in self.providers.iter().enumerate() {
            let name = provider.provider_name();
            let attempt = request.with_model(self.resolve_model(&request.model, name));

            debug!(
                "Trying provider {} ({}/{}) model={}",
                name,
                idx + 1,
                self.providers.len(),
                attempt.model
            );

            match provider.chat(&attempt).await {
                Ok(response) => {
                    if idx > 0 {
                        info!(
                            "Request succeeded on fallback provider {} ({})",
                            name, response.model
                        );
                    }
                    self.costs.record(name, response.cost);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", name, e);
                    failures.push(ProviderFailure {
                        provider: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(RouterError::AllProvidersFailed {
            streaming: false,
            failures,
        })
    }

    /// Stream a chat completion, falling back only until the first chunk.
    ///
    /// Once any chunk has been yielded, a provider error ends the stream with
    /// [`RouterError::PartialStream`] instead of switching providers. Dropping
    /// the returned stream drops the provider stream it is reading from.
    pub fn chat_stream<'a>(
        &'a self,
        request: &ChatRequest,
    ) -> BoxStream<'a, Result<StreamChunk, RouterError>> {
        let request = request.clone();

        Box::pin(stream! {
            let mut failures = Vec::new();

            for (idx, provider) in self.providers.iter().enumerate() {
                let name = provider.provider_name();
                let attempt = request.with_model(self.resolve_model(&request.model, name));

                debug!(
                    "Trying stream on provider {} ({}/{}) model={}",
                    name,
                    idx + 1,
                    self.providers.len(),
                    attempt.model
                );

                let mut chunks = provider.chat_stream(&attempt);
                let mut has_yielded = false;
                let mut failure = None;

                while let Some(item) = chunks.next().await {
                    match item {
                        Ok(chunk) => {
                            has_yielded = true;
                            yield Ok(chunk);
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                let Some(e) = failure else {
                    if idx > 0 {
                        info!("Stream succeeded on fallback provider {}", name);
                    }
                    return;
                };

                if has_yielded {
                    warn!(
                        "Provider {} failed mid-stream, not falling back: {}",
                        name, e
                    );
                    yield Err(RouterError::PartialStream {
                        provider: name.to_string(),
                        source: e,
                    });
                    return;
                }

                warn!("Provider {} failed before streaming: {}", name, e);
                failures.push(ProviderFailure {
                    provider: name.to_string(),
                    error: e.to_string(),
                });
            }

            yield Err(RouterError::AllProvidersFailed {
                streaming: true,
                failures,
            });
        })
    }

    /// Snapshot of accumulated spend
    pub fn cost_stats(&self) -> CostStats {
        self.costs.snapshot()
    }

    /// First adapter with the given name
    pub fn provider(&self, name: &str) -> Option<&dyn LlmProvider> {
        self.providers
            .iter()
            .find(|p| p.provider_name() == name)
            .map(|p| p.as_ref())
    }

    /// Provider names in fallback order
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}
