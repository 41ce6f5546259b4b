use anyhow::{anyhow, Context, Result};
use std::env;

use super::factory::ProviderType;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const ANTHROPIC_MAX_TOKENS: i32 = 1024;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-5.2";

pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GOOGLE_MODEL: &str = "gemini-3-pro-preview";

/// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
    Google(GoogleProviderConfig),
}

impl ProviderConfig {
    /// Load the configuration of the given provider from the process environment
    pub fn from_env(provider_type: ProviderType) -> Result<Self> {
        Ok(match provider_type {
            ProviderType::Anthropic => Self::Anthropic(AnthropicProviderConfig::from_env()?),
            ProviderType::OpenAi => Self::OpenAi(OpenAiProviderConfig::from_env()?),
            ProviderType::Google => Self::Google(GoogleProviderConfig::from_env()?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: i32,
}

impl AnthropicProviderConfig {
    pub fn from_env() -> Result<Self> {
        let max_tokens = match get_env("ANTHROPIC_MAX_TOKENS", false, None)? {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid ANTHROPIC_MAX_TOKENS '{}'", value))?,
            None => ANTHROPIC_MAX_TOKENS,
        };

        Ok(Self {
            host: get_env_or("ANTHROPIC_HOST", ANTHROPIC_HOST)?,
            api_key: get_credential("ANTHROPIC_API_KEY")?,
            model: get_env_or("ANTHROPIC_MODEL", ANTHROPIC_MODEL)?,
            max_tokens,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn from_env() -> Result<Self> {
        let max_tokens = get_env("OPENAI_MAX_TOKENS", false, None)?
            .map(|value| {
                value
                    .parse()
                    .with_context(|| format!("Invalid OPENAI_MAX_TOKENS '{}'", value))
            })
            .transpose()?;

        Ok(Self {
            host: get_env_or("OPENAI_HOST", OPENAI_HOST)?,
            api_key: get_credential("OPENAI_API_KEY")?,
            model: get_env_or("OPENAI_MODEL", OPENAI_MODEL)?,
            max_tokens,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl GoogleProviderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: get_env_or("GOOGLE_HOST", GOOGLE_HOST)?,
            api_key: get_credential("GOOGLE_API_KEY")?,
            model: get_env_or("GOOGLE_MODEL", GOOGLE_MODEL)?,
        })
    }
}

/// Helper function to get environment variables with error handling
pub fn get_env(key: &str, required: bool, default: Option<String>) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) if !required => Ok(default),
        Err(env::VarError::NotPresent) => Err(anyhow!(
            "Environment variable '{}' is required but not set.",
            key
        )),
        Err(e) => Err(e.into()),
    }
}

fn get_env_or(key: &str, default: &str) -> Result<String> {
    Ok(get_env(key, false, Some(default.to_string()))?.unwrap_or_else(|| default.to_string()))
}

fn get_credential(key: &str) -> Result<String> {
    let value = get_env(key, true, None)?.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(anyhow!("Environment variable '{}' is set but empty.", key));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_optional_default() {
        let value = get_env("DROVER_TEST_UNSET_VARIABLE", false, Some("x".to_string())).unwrap();
        assert_eq!(value, Some("x".to_string()));
    }

    #[test]
    fn test_get_env_required_missing() {
        let err = get_env("DROVER_TEST_UNSET_VARIABLE", true, None).unwrap_err();
        assert!(err.to_string().contains("is required but not set"));
    }

    #[test]
    fn test_credential_must_not_be_empty() {
        env::set_var("DROVER_TEST_EMPTY_CREDENTIAL", "  ");
        let err = get_credential("DROVER_TEST_EMPTY_CREDENTIAL").unwrap_err();
        assert!(err.to_string().contains("is set but empty"));
    }
}
