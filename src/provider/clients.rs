//! HTTP clients for each supported backend.

use super::{
    build_provider_http_client, map_http_error, map_status_error, ChatMessage,
    CompletionOptions, CompletionResponse, MessageRole, ModelProviderClient, TokenUsage,
};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

// OpenAI-compatible chat completion shapes, shared by OpenAI, Ollama and
// local servers.
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn chat_request<'a>(
    model: &'a str,
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
    supports_json_mode: bool,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: messages
            .into_iter()
            .map(|msg| OpenAIMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content,
            })
            .collect(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        top_p: options.top_p,
        stop: options.stop,
        response_format: (supports_json_mode && options.json_response)
            .then(|| json!({"type": "json_object"})),
        stream: false,
    }
}

async fn send_chat_completion(request: RequestBuilder) -> Result<CompletionResponse, ApiError> {
    let response = request.send().await.map_err(map_http_error)?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(map_status_error(status.as_u16(), &error_text));
    }

    let completion: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::ProviderError("No choices in response".to_string()))?;

    let usage = completion
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        content: choice.message.content,
        model: completion.model,
        usage,
        finish_reason: choice.finish_reason,
    })
}

pub struct OpenAIClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        let base_url = base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client,
            model,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl ModelProviderClient for OpenAIClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&chat_request(&self.model, messages, options, true));
        send_chat_completion(request).await
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic messages API client.
pub struct AnthropicClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    const API_VERSION: &'static str = "2023-06-01";
    const DEFAULT_MAX_TOKENS: u32 = 1024;

    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        let base_url = base_url.unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
        Ok(Self {
            client,
            model,
            api_key,
            base_url,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], options: &CompletionOptions) -> serde_json::Value {
        // System text travels outside the message list.
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let turns: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": options.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS),
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &options.stop {
            body["stop_sequences"] = json!(stop);
        }
        body
    }
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .json(&self.request_body(&messages, &options))
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status_error(status.as_u16(), &error_text));
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let content = completion
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: completion.model,
            usage,
            finish_reason: completion.stop_reason,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama through its OpenAI-compatible endpoint.
pub struct OllamaClient {
    client: Client,
    model: String,
    base_url: String,
}

impl OllamaClient {
    pub fn new(model: String, base_url: Option<String>) -> Result<Self, ApiError> {
        let base_url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = build_provider_http_client()?;

        Ok(Self {
            client,
            model,
            base_url,
        })
    }
}

#[async_trait]
impl ModelProviderClient for OllamaClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .post(&url)
            .json(&chat_request(&self.model, messages, options, true));
        send_chat_completion(request).await
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Any OpenAI-compatible server (vLLM, llama.cpp, LM Studio).
pub struct CustomLocalClient {
    client: Client,
    model: String,
    endpoint: String,
    api_key: Option<String>,
}

impl CustomLocalClient {
    pub fn new(model: String, endpoint: String, api_key: Option<String>) -> Result<Self, ApiError> {
        let client = build_provider_http_client()?;
        Ok(Self {
            client,
            model,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ModelProviderClient for CustomLocalClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        // Local servers vary in response_format support; leave it off.
        let mut request = self
            .client
            .post(&url)
            .json(&chat_request(&self.model, messages, options, false));
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }
        send_chat_completion(request).await
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
