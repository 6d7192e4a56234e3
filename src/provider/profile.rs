//! Provider configuration as written in config files.

use super::{CompletionOptions, ModelProvider};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    #[serde(alias = "custom")]
    Local,
}

impl ProviderType {
    /// Environment variable consulted when no api key is configured.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::Local => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
            ProviderType::Local => "local",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    pub provider_type: ProviderType,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "Endpoint must be an http(s) URL, got '{}'",
                    endpoint
                ));
            }
        }

        if self.provider_type == ProviderType::Local && self.endpoint.is_none() {
            return Err("Local providers require an endpoint".to_string());
        }

        if let Some(temperature) = self.default_options.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }

        Ok(())
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                self.provider_type
                    .api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|key| !key.is_empty())
            })
    }

    fn require_api_key(&self) -> Result<String, ApiError> {
        self.resolve_api_key().ok_or_else(|| {
            let name = self.provider_name.as_deref().unwrap_or("unnamed");
            let hint = self
                .provider_type
                .api_key_env()
                .map(|var| format!(" (set api_key or {})", var))
                .unwrap_or_default();
            ApiError::ProviderNotConfigured(format!(
                "Provider '{}' has no API key{}",
                name, hint
            ))
        })
    }

    /// Resolve into connection details, pulling missing keys from the environment.
    pub fn to_model_provider(&self) -> Result<ModelProvider, ApiError> {
        let model = self.model.clone();
        match self.provider_type {
            ProviderType::OpenAI => Ok(ModelProvider::OpenAI {
                model,
                api_key: self.require_api_key()?,
                base_url: self.endpoint.clone(),
            }),
            ProviderType::Anthropic => Ok(ModelProvider::Anthropic {
                model,
                api_key: self.require_api_key()?,
                base_url: self.endpoint.clone(),
            }),
            ProviderType::Ollama => Ok(ModelProvider::Ollama {
                model,
                base_url: self.endpoint.clone(),
            }),
            ProviderType::Local => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ApiError::Configuration("Local providers require an endpoint".to_string())
                })?;
                Ok(ModelProvider::LocalCustom {
                    model,
                    endpoint,
                    api_key: self.resolve_api_key(),
                })
            }
        }
    }
}
