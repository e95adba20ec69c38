use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::error::UnsupportedProviderError;

/// Sort rank for providers configured without an explicit priority
pub const DEFAULT_PRIORITY: u32 = u32::MAX;

/// The closed set of supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::OpenAi, Self::Anthropic, Self::Gemini];

    /// Stable identifier used for cost bucketing and alias lookup
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnsupportedProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(UnsupportedProviderError(other.to_string())),
        }
    }
}

/// One entry of the router's provider list
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend identifier ("openai", "anthropic", "gemini")
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    /// Lower is tried first; unset sorts after every explicit priority.
    ///
    /// `Some(0)` is a real priority and ranks ahead of everything else; it is
    /// not treated as "unset".
    #[serde(default)]
    pub priority: Option<u32>,
    /// Override the vendor endpoint (proxies, tests)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &mask_secret(&self.api_key))
            .field("priority", &self.priority)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            priority: None,
            base_url: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn kind(&self) -> Result<ProviderKind, UnsupportedProviderError> {
        self.name.parse()
    }
}

/// Router configuration, usually loaded from `~/.multiai/config.toml`
///
/// ```toml
/// [[providers]]
/// name = "openai"
/// api_key = "${OPENAI_API_KEY}"
/// priority = 1
///
/// [[providers]]
/// name = "anthropic"
/// api_key = "${ANTHROPIC_API_KEY}"
/// priority = 2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".multiai")
}

impl RouterConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path
            .clone()
            .unwrap_or_else(|| config_dir().join("config.toml"));

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;

        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        // Inspect the keys as written, before `${VAR}` expansion
        let written: RouterConfig = toml::from_str(&content).unwrap_or_default();
        for provider in &written.providers {
            if looks_hardcoded(&provider.api_key) {
                warn!(
                    "API key for provider {} is hardcoded in config file. For security, use environment variables: api_key = \"${{{}}}\"",
                    provider.name,
                    env_var_hint(&provider.name)
                );
            }
        }

        Ok(config)
    }

    /// Parse TOML, expanding allowlisted `${VAR}` references first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).context("Invalid router config")
    }

    /// One provider per backend whose API key is present in the environment
    pub fn from_env() -> Self {
        let providers: Vec<ProviderConfig> = ProviderKind::ALL
            .iter()
            .filter_map(|kind| {
                env_keys(*kind)
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
                    .map(|key| ProviderConfig::new(kind.as_str(), key))
            })
            .collect();

        if providers.is_empty() {
            warn!(
                "No LLM providers configured. Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY."
            );
        }

        Self { providers }
    }
}

fn env_keys(kind: ProviderKind) -> &'static [&'static str] {
    match kind {
        ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
        ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"],
    }
}

fn env_var_hint(name: &str) -> &'static str {
    name.parse::<ProviderKind>()
        .map(|kind| env_keys(kind)[0])
        .unwrap_or("API_KEY")
}

fn looks_hardcoded(api_key: &str) -> bool {
    !api_key.is_empty() && !api_key.contains("${")
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_AI_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}
