use super::{
    anthropic::AnthropicProvider, base::Provider, configs::ProviderConfig,
    google::GoogleProvider, openai::OpenAiProvider,
};
use anyhow::Result;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderType {
    Anthropic,
    OpenAi,
    Google,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown provider '{name}', expected one of: {expected}")]
pub struct UnknownProviderError {
    pub name: String,
    pub expected: String,
}

impl ProviderType {
    /// Parse a provider identifier such as `anthropic`, `openai` or `google`, ignoring case
    pub fn parse(name: &str) -> Result<Self, UnknownProviderError> {
        Self::from_str(name.trim()).map_err(|_| UnknownProviderError {
            name: name.to_string(),
            expected: Self::iter()
                .map(|provider| provider.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Google(google_config) => Ok(Box::new(GoogleProvider::new(google_config)?)),
    }
}

/// Build the provider named by `name`, reading its credentials from the environment
pub fn provider_from_env(name: &str) -> Result<Box<dyn Provider>> {
    let provider_type = ProviderType::parse(name)?;
    get_provider(ProviderConfig::from_env(provider_type)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ProviderType::parse("anthropic"), Ok(ProviderType::Anthropic));
        assert_eq!(ProviderType::parse("OpenAI"), Ok(ProviderType::OpenAi));
        assert_eq!(ProviderType::parse("GOOGLE"), Ok(ProviderType::Google));
    }

    #[test]
    fn test_parse_unknown_provider() {
        let err = ProviderType::parse("mistral").unwrap_err();
        assert_eq!(err.name, "mistral");
        assert_eq!(err.expected, "anthropic, openai, google");
        assert_eq!(
            err.to_string(),
            "Unknown provider 'mistral', expected one of: anthropic, openai, google"
        );
    }

    #[test]
    fn test_provider_from_env_unknown_is_an_error() {
        let err = provider_from_env("ollama").err().unwrap();
        assert!(err.downcast_ref::<UnknownProviderError>().is_some());
    }

    #[test]
    fn test_display_round_trips() {
        for provider in ProviderType::iter() {
            assert_eq!(ProviderType::parse(&provider.to_string()), Ok(provider));
        }
    }
}
