//! Symbolic model tiers resolved per provider

use std::str::FromStr;

use crate::config::ProviderKind;

/// Hand-curated model tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Smart,
    Fast,
    Cheap,
}

impl FromStr for ModelTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(Self::Smart),
            "fast" => Ok(Self::Fast),
            "cheap" => Ok(Self::Cheap),
            _ => Err(()),
        }
    }
}

impl ModelTier {
    /// Concrete model id for this tier on `provider`
    pub fn model_for(&self, provider: ProviderKind) -> &'static str {
        match (self, provider) {
            (Self::Smart, ProviderKind::OpenAi) => "gpt-4o",
            (Self::Smart, ProviderKind::Anthropic) => "claude-3-5-sonnet-20240620",
            (Self::Smart, ProviderKind::Gemini) => "gemini-1.5-pro",
            (Self::Fast | Self::Cheap, ProviderKind::OpenAi) => "gpt-4o-mini",
            (Self::Fast | Self::Cheap, ProviderKind::Anthropic) => "claude-3-haiku-20240307",
            (Self::Fast | Self::Cheap, ProviderKind::Gemini) => "gemini-1.5-flash",
        }
    }
}

/// Resolve `alias` for the provider named `provider_name`.
///
/// Anything that is not a known tier for a known provider passes through
/// unchanged, so literal model ids always work.
pub fn resolve_model(alias: &str, provider_name: &str) -> String {
    match (alias.parse::<ModelTier>(), provider_name.parse::<ProviderKind>()) {
        (Ok(tier), Ok(provider)) => tier.model_for(provider).to_string(),
        _ => alias.to_string(),
    }
}
