pub mod prompt;

use crate::cli::Args;
use crate::llm::{ Provider, ProviderConfig };
use log::{ info, warn };
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use self::prompt::{ load_prompts, PromptConfig, PromptError };

pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL '{url}' for provider {provider}: {source}")]
    InvalidBaseUrl {
        provider: Provider,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Base URL '{url}' for provider {provider} must use http or https")]
    UnsupportedScheme {
        provider: Provider,
        url: String,
    },
    #[error("Max duration must be greater than zero")]
    ZeroDuration,
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Everything the relay needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    providers: HashMap<Provider, ProviderConfig>,
    pub prompts: PromptConfig,
    pub max_duration: Duration,
}

impl RelayConfig {
    pub fn new(
        providers: Vec<ProviderConfig>,
        prompts: PromptConfig,
        max_duration: Duration
    ) -> Result<Self, ConfigError> {
        if max_duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        prompts.validate()?;
        for config in &providers {
            validate_base_url(config)?;
        }
        Ok(Self {
            providers: providers
                .into_iter()
                .map(|c| (c.provider, c))
                .collect(),
            prompts,
            max_duration,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let prompts = match (&args.prompts_path, &args.system_prompt) {
            (Some(path), _) => {
                info!("Loading system prompt from {}", path);
                load_prompts(path)?
            }
            (None, Some(template)) => PromptConfig::new(template.clone())?,
            (None, None) => PromptConfig::default(),
        };

        let providers = vec![
            ProviderConfig::new(
                Provider::Together,
                args.together_api_key.clone(),
                args.together_base_url.clone()
            ),
            ProviderConfig::new(
                Provider::OpenRouter,
                args.openrouter_api_key.clone(),
                args.openrouter_base_url.clone()
            )
        ];

        let config = Self::new(providers, prompts, Duration::from_secs(args.max_duration_secs))?;
        config.warn_missing_keys();
        Ok(config)
    }

    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.get(&provider)
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL.into_iter()
            .filter(|p| self.provider(*p).map_or(false, ProviderConfig::has_api_key))
            .collect()
    }

    fn warn_missing_keys(&self) {
        for provider in Provider::ALL {
            match self.provider(provider) {
                Some(config) if config.has_api_key() => {
                    info!("Provider {} configured at {}", provider, config.base_url);
                }
                _ => {
                    warn!(
                        "Provider {} has no API key configured; requests for it will fail.",
                        provider
                    );
                }
            }
        }
    }
}

fn validate_base_url(config: &ProviderConfig) -> Result<(), ConfigError> {
    let parsed = Url::parse(&config.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
        provider: config.provider,
        url: config.base_url.clone(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ =>
            Err(ConfigError::UnsupportedScheme {
                provider: config.provider,
                url: config.base_url.clone(),
            }),
    }
}
