//! Text embedders used to query the vector store.

use crate::error::ApiError;
use crate::provider::{build_provider_http_client, map_http_error, map_status_error};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Turns text into a dense vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    fn name(&self) -> &str;
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Offline feature-hashing embedder.
///
/// Text is NFKC-normalized, lowercased and split on non-alphanumerics. Each
/// token is hashed with blake3; the first eight bytes pick a bucket and the
/// ninth picks the sign. The result is L2-normalized, so identical token
/// bags always embed to the same unit vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIM: usize = 256;

    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let normalized: String = text.nfkc().collect::<String>().to_lowercase();

        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&bytes[..8]);
            let index = (u64::from_le_bytes(index_bytes) % self.dim as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        Ok(self.embed_sync(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// OpenAI `/embeddings` client.
pub struct OpenAIEmbedder {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-small";

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
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
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

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            ApiError::ProviderError(format!("Failed to parse embedding response: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ApiError::ProviderError("No embedding in response".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
