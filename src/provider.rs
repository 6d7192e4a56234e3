//! Generation backend abstraction.
//!
//! Every backend (OpenAI, Anthropic, Ollama, any OpenAI-compatible local
//! server) sits behind [`ModelProviderClient`]. The pipeline only ever sees
//! `complete(messages, options) -> CompletionResponse` and validates the
//! returned text itself.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub mod clients;
pub mod profile;

pub use clients::{AnthropicClient, CustomLocalClient, OllamaClient, OpenAIClient};
pub use profile::{ProviderConfig, ProviderType};

/// Resolved connection details for one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAI {
        model: String,
        api_key: String,
        base_url: Option<String>,
    },
    Anthropic {
        model: String,
        api_key: String,
        base_url: Option<String>,
    },
    Ollama {
        model: String,
        base_url: Option<String>, // Default: http://localhost:11434
    },
    LocalCustom {
        model: String,
        endpoint: String, // e.g. http://localhost:8080/v1
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    /// Ask the backend for a JSON object response where it supports it.
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: None,
            top_p: None,
            stop: None,
            json_response: true,
        }
    }
}

impl CompletionOptions {
    /// Fill unset fields from `defaults`.
    pub fn or(mut self, defaults: &CompletionOptions) -> Self {
        self.temperature = self.temperature.or(defaults.temperature);
        self.max_tokens = self.max_tokens.or(defaults.max_tokens);
        self.top_p = self.top_p.or(defaults.top_p);
        if self.stop.is_none() {
            self.stop = defaults.stop.clone();
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

pub(crate) fn map_status_error(status: u16, body: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => ApiError::ProviderModelNotFound(format!("Model not found: {}", body)),
        _ => ApiError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        map_status_error(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn build_provider_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        provider: &ModelProvider,
    ) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        match provider {
            ModelProvider::OpenAI {
                model,
                api_key,
                base_url,
            } => Ok(Arc::new(OpenAIClient::new(
                model.clone(),
                api_key.clone(),
                base_url.clone(),
            )?)),
            ModelProvider::Anthropic {
                model,
                api_key,
                base_url,
            } => Ok(Arc::new(AnthropicClient::new(
                model.clone(),
                api_key.clone(),
                base_url.clone(),
            )?)),
            ModelProvider::Ollama { model, base_url } => Ok(Arc::new(OllamaClient::new(
                model.clone(),
                base_url.clone(),
            )?)),
            ModelProvider::LocalCustom {
                model,
                endpoint,
                api_key,
            } => Ok(Arc::new(CustomLocalClient::new(
                model.clone(),
                endpoint.clone(),
                api_key.clone(),
            )?)),
        }
    }
}

/// Named provider configurations, as declared under `[providers.<name>]`.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(providers: &BTreeMap<String, ProviderConfig>) -> Self {
        let mut registry = Self::new();
        for (name, config) in providers {
            registry.register(name, config.clone());
        }
        registry
    }

    pub fn register(&mut self, name: &str, mut config: ProviderConfig) {
        if config.provider_name.is_none() {
            config.provider_name = Some(name.to_string());
        }
        self.providers.insert(name.to_string(), config);
    }

    pub fn get(&self, provider_name: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_name)
    }

    pub fn get_or_error(&self, provider_name: &str) -> Result<&ProviderConfig, ApiError> {
        self.get(provider_name).ok_or_else(|| {
            ApiError::ProviderNotConfigured(format!("Provider not found: {}", provider_name))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn list_by_type(&self, provider_type: Option<ProviderType>) -> Vec<&ProviderConfig> {
        self.providers
            .values()
            .filter(|p| provider_type.map_or(true, |t| p.provider_type == t))
            .collect()
    }

    pub fn create_client(
        &self,
        provider_name: &str,
    ) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        let provider_config = self.get_or_error(provider_name)?;
        let model_provider = provider_config.to_model_provider()?;
        ProviderFactory::create_client(&model_provider)
    }
}
