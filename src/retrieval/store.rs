//! Vector search collaborators: an in-memory corpus store and a
//! Pinecone-compatible HTTP store.

use crate::error::ApiError;
use crate::provider::{build_provider_http_client, map_http_error, map_status_error};
use crate::retrieval::embedder::{cosine_similarity, Embedder};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Metadata filter applied to every search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub curriculum: Option<String>,
    /// Accepted grade labels; empty means any grade.
    pub grades: Vec<String>,
}

impl SearchFilter {
    /// Filter for a request, accepting both "Year N" and "Grade N" spellings.
    pub fn for_request(curriculum: &str, grade: &str) -> Self {
        let curriculum = curriculum.trim();
        let grade = grade.trim();
        let mut grades = Vec::new();
        if !grade.is_empty() {
            grades.push(grade.to_string());
            let variant = if grade.contains("Year") {
                Some(grade.replace("Year", "Grade"))
            } else if grade.contains("Grade") {
                Some(grade.replace("Grade", "Year"))
            } else {
                None
            };
            if let Some(variant) = variant {
                grades.push(variant);
            }
        }
        Self {
            curriculum: (!curriculum.is_empty()).then(|| curriculum.to_string()),
            grades,
        }
    }

    /// Entries without a curriculum or grade tag match any filter value.
    pub fn matches(&self, curriculum: Option<&str>, grade: Option<&str>) -> bool {
        let curriculum_ok = match (&self.curriculum, curriculum) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        let grade_ok = match grade {
            Some(actual) if !self.grades.is_empty() => self.grades.iter().any(|g| g == actual),
            _ => true,
        };
        curriculum_ok && grade_ok
    }
}

/// One raw search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub text: String,
    pub source: String,
    pub score: f32,
    /// Stored vector, when the backend returns it.
    pub values: Option<Vec<f32>>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError>;

    fn name(&self) -> &str;
}

/// Corpus file entry. A corpus file holds a JSON array of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub curriculum: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    id: String,
    text: String,
    source: String,
    curriculum: Option<String>,
    grade: Option<String>,
    values: Vec<f32>,
}

/// Chunks embedded once at load and scored by cosine similarity.
pub struct InMemoryVectorStore {
    chunks: Vec<IndexedChunk>,
}

impl InMemoryVectorStore {
    pub fn empty() -> Self {
        Self { chunks: Vec::new() }
    }

    pub async fn from_entries(
        entries: Vec<CorpusEntry>,
        embedder: &dyn Embedder,
    ) -> Result<Self, ApiError> {
        let mut chunks = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.text.trim().is_empty() {
                continue;
            }
            let values = embedder.embed(&entry.text).await?;
            let id = entry.id.unwrap_or_else(|| format!("chunk-{}", index));
            chunks.push(IndexedChunk {
                source: entry.source.unwrap_or_else(|| id.clone()),
                id,
                text: entry.text,
                curriculum: entry.curriculum,
                grade: entry.grade,
                values,
            });
        }
        Ok(Self { chunks })
    }

    /// Load every `*.json` file under `dir`. Entries without an id get
    /// `{file_stem}#{index}`.
    pub async fn from_corpus_dir(dir: &Path, embedder: &dyn Embedder) -> Result<Self, ApiError> {
        if !dir.is_dir() {
            return Err(ApiError::Configuration(format!(
                "Retrieval corpus directory not found: {}",
                dir.display()
            )));
        }

        let mut files: Vec<_> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable corpus entry");
                    None
                }
            })
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some("json")
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        let mut entries = Vec::new();
        for path in &files {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ApiError::Configuration(format!("Failed to read corpus file {}: {}", path.display(), e))
            })?;
            let file_entries: Vec<CorpusEntry> = serde_json::from_str(&content).map_err(|e| {
                ApiError::Configuration(format!("Invalid corpus file {}: {}", path.display(), e))
            })?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("corpus")
                .to_string();
            for (index, mut entry) in file_entries.into_iter().enumerate() {
                if entry.id.is_none() {
                    entry.id = Some(format!("{}#{}", stem, index));
                }
                if entry.source.is_none() {
                    entry.source = Some(stem.clone());
                }
                entries.push(entry);
            }
        }

        let store = Self::from_entries(entries, embedder).await?;
        info!(
            corpus_dir = %dir.display(),
            files = files.len(),
            chunks = store.len(),
            "Loaded retrieval corpus"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        let mut matches: Vec<VectorMatch> = self
            .chunks
            .iter()
            .filter(|chunk| filter.matches(chunk.curriculum.as_deref(), chunk.grade.as_deref()))
            .map(|chunk| VectorMatch {
                id: chunk.id.clone(),
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                score: cosine_similarity(embedding, &chunk.values),
                values: Some(chunk.values.clone()),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Pinecone-compatible `POST {endpoint}/query` client.
pub struct HttpVectorStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    values: Option<Vec<f32>>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl HttpVectorStore {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_provider_http_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn filter_body(filter: &SearchFilter) -> Value {
        let mut body = Map::new();
        if let Some(curriculum) = &filter.curriculum {
            body.insert("curriculum".to_string(), json!({ "$eq": curriculum }));
        }
        if !filter.grades.is_empty() {
            body.insert("grade".to_string(), json!({ "$in": filter.grades }));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        let body = json!({
            "vector": embedding,
            "topK": top_k,
            "filter": Self::filter_body(filter),
            "includeMetadata": true,
            "includeValues": true,
        });

        let url = format!("{}/query", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            request = request.header("Api-Key", api_key);
        }

        let response = request
            .json(&body)
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

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Retrieval(format!("Failed to parse query response: {}", e)))?;

        let matches: Vec<VectorMatch> = parsed
            .matches
            .into_iter()
            .map(|m| {
                let text = metadata_str(&m.metadata, "content")
                    .or_else(|| metadata_str(&m.metadata, "text"))
                    .unwrap_or_default();
                let source = metadata_str(&m.metadata, "source").unwrap_or_else(|| m.id.clone());
                VectorMatch {
                    id: m.id,
                    text,
                    source,
                    score: m.score,
                    values: m.values.filter(|v| !v.is_empty()),
                }
            })
            .collect();

        debug!(endpoint = %self.endpoint, results = matches.len(), "Vector query completed");
        Ok(matches)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn metadata_str(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
