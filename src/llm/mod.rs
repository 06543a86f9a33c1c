pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

pub const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Together,
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Together, Provider::OpenRouter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Together => "together",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Together => TOGETHER_BASE_URL,
            Provider::OpenRouter => OPENROUTER_BASE_URL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseProviderError {
    message: String,
}

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseProviderError {}

/// Provider names are matched exactly; `"Together"` is not a provider.
impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "together" => Ok(Provider::Together),
            "openrouter" => Ok(Provider::OpenRouter),
            _ =>
                Err(ParseProviderError {
                    message: format!("Invalid provider: '{}'", s),
                }),
        }
    }
}

/// Connection settings for one upstream provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

// Keeps keys out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers() {
        assert_eq!("together".parse::<Provider>(), Ok(Provider::Together));
        assert_eq!("openrouter".parse::<Provider>(), Ok(Provider::OpenRouter));
    }

    #[test]
    fn rejects_unknown_and_differently_cased_names() {
        assert!("bogus".parse::<Provider>().is_err());
        assert!("".parse::<Provider>().is_err());
        assert!("Together".parse::<Provider>().is_err());
        let err = "bogus".parse::<Provider>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid provider: 'bogus'");
    }

    #[test]
    fn blank_settings_fall_back_to_defaults() {
        let config = ProviderConfig::new(
            Provider::OpenRouter,
            Some("  ".to_string()),
            Some(String::new())
        );
        assert!(!config.has_api_key());
        assert_eq!(config.base_url, OPENROUTER_BASE_URL);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = ProviderConfig::new(Provider::Together, Some("sk-secret".to_string()), None);
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
