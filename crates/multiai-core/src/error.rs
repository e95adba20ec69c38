//! Error types for adapters and the router.

use serde::Serialize;
use thiserror::Error;

/// A single adapter call failed.
///
/// Every variant names the provider, so the rendered message always says
/// which backend failed and why.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed before a usable response arrived
    #[error("{provider} request failed: {source}")]
    Request {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// API returned an error response
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Response body could not be understood
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    /// The event stream broke or reported an error mid-flight
    #[error("{provider} stream error: {message}")]
    Stream { provider: String, message: String },
}

impl ProviderError {
    /// The URL is dropped from `source`; it may carry credentials.
    pub fn request(provider: &str, source: reqwest::Error) -> Self {
        Self::Request {
            provider: provider.to_string(),
            source: source.without_url(),
        }
    }

    pub fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn stream(provider: &str, message: impl Into<String>) -> Self {
        Self::Stream {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Name of the provider that failed
    pub fn provider(&self) -> &str {
        match self {
            Self::Request { provider, .. }
            | Self::Api { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::Stream { provider, .. } => provider,
        }
    }
}

/// Turn a non-2xx response into `ProviderError::Api`, passing successes through.
pub async fn check_response(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ProviderError::Api {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// One entry in the failure list of [`RouterError::AllProvidersFailed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Terminal errors surfaced by [`crate::ModelRouter`]
#[derive(Debug, Error)]
pub enum RouterError {
    /// Every configured provider failed (for streams: before yielding anything)
    #[error("{}", describe_all_failed(.streaming, .failures))]
    AllProvidersFailed {
        streaming: bool,
        failures: Vec<ProviderFailure>,
    },

    /// A stream failed after chunks already reached the caller
    #[error(
        "stream from {provider} failed after partial output was already delivered to the caller; \
         resuming on another provider is unsafe, so no fallback was attempted: {source}"
    )]
    PartialStream {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

impl RouterError {
    /// Per-provider failures, in the order the providers were tried
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::AllProvidersFailed { failures, .. } => failures,
            Self::PartialStream { .. } => &[],
        }
    }
}

fn describe_all_failed(streaming: &bool, failures: &[ProviderFailure]) -> String {
    let what = if *streaming {
        "All providers failed streaming"
    } else {
        "All providers failed"
    };
    if failures.is_empty() {
        return format!("{} (no providers configured)", what);
    }
    let details: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!("{}. Errors: [{}]", what, details.join("; "))
}

/// Returned when a configuration names a backend outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider {0} not supported")]
pub struct UnsupportedProviderError(pub String);
