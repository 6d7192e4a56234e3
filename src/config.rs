//! Configuration
//!
//! Layered configuration for the planner: built-in defaults, the global
//! user file, workspace files, then `THINKBLOCKS__*` environment variables.
//! Every section has serde defaults so a missing file is a valid config.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::retry::RetryPolicy;
use crate::skills::DifficultyPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub providers: BTreeMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub prompts: PromptConfig,
    pub skills: SkillsConfig,
    pub selection: DifficultyPolicy,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Name into `providers`; may be omitted when exactly one is configured.
    pub provider: Option<String>,
    pub retry: RetryPolicy,
    /// Base for skill media suggestions. No media is suggested when unset.
    pub media_base_url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: None,
            retry: RetryPolicy::generation_default(),
            media_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    Memory,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Hashing,
    #[serde(rename = "openai")]
    OpenAI,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    /// Vector index endpoint for the `http` backend.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Directory of `*.json` chunk files for the `memory` backend.
    pub corpus_dir: Option<PathBuf>,
    pub embedder: EmbedderKind,
    pub embedding_model: Option<String>,
    pub embedding_dim: usize,
    pub top_k: usize,
    pub min_score: f32,
    pub dedup_threshold: f32,
    pub token_budget: usize,
    pub retry: RetryPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::Memory,
            endpoint: None,
            api_key: None,
            corpus_dir: None,
            embedder: EmbedderKind::Hashing,
            embedding_model: None,
            embedding_dim: 256,
            top_k: 5,
            min_score: 0.2,
            dedup_threshold: 0.95,
            token_budget: 1_500,
            retry: RetryPolicy::retrieval_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub context_token_budget: usize,
    pub templates_file: Option<PathBuf>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_token_budget: 1_200,
            templates_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    pub catalog_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    /// Whole-lesson deadline; 0 disables it.
    pub request_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            request_timeout_secs: 90,
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".thinkblocks/lessons"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Provider(String, String),
    Section(&'static str, String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Provider(name, msg) => write!(f, "Provider '{}': {}", name, msg),
            ValidationError::Section(section, msg) => write!(f, "[{}] {}", section, msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn resolve(root: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = root.join(&*path);
    }
}

impl PlannerConfig {
    /// Name of the generation provider, falling back to the only one configured.
    pub fn generation_provider(&self) -> Option<&str> {
        match &self.generation.provider {
            Some(name) => Some(name.as_str()),
            None if self.providers.len() == 1 => self.providers.keys().next().map(String::as_str),
            None => None,
        }
    }

    /// Anchor relative file paths at `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        if let Some(dir) = self.retrieval.corpus_dir.as_mut() {
            resolve(root, dir);
        }
        if let Some(file) = self.prompts.templates_file.as_mut() {
            resolve(root, file);
        }
        if let Some(file) = self.skills.catalog_file.as_mut() {
            resolve(root, file);
        }
        resolve(root, &mut self.storage.path);
    }

    /// Every violation, not just the first.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut section = |name: &'static str, result: Result<(), String>| {
            if let Err(msg) = result {
                errors.push(ValidationError::Section(name, msg));
            }
        };

        section("generation", self.generation.retry.validate());
        if let Some(url) = &self.generation.media_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                section(
                    "generation",
                    Err(format!("media_base_url must be an http(s) URL, got '{}'", url)),
                );
            }
        }

        section("retrieval", self.retrieval.retry.validate());
        let retrieval = &self.retrieval;
        if !(0.0..=1.0).contains(&retrieval.min_score) {
            section(
                "retrieval",
                Err(format!("min_score must be within [0, 1], got {}", retrieval.min_score)),
            );
        }
        if !(0.0..=1.0).contains(&retrieval.dedup_threshold) {
            section(
                "retrieval",
                Err(format!(
                    "dedup_threshold must be within [0, 1], got {}",
                    retrieval.dedup_threshold
                )),
            );
        }
        if retrieval.top_k == 0 {
            section("retrieval", Err("top_k must be at least 1".to_string()));
        }
        if retrieval.embedding_dim == 0 {
            section("retrieval", Err("embedding_dim must be at least 1".to_string()));
        }
        if retrieval.backend == RetrievalBackend::Http && retrieval.endpoint.is_none() {
            section(
                "retrieval",
                Err("the http backend requires an endpoint".to_string()),
            );
        }

        if self.prompts.context_token_budget == 0 {
            section(
                "prompts",
                Err("context_token_budget must be at least 1".to_string()),
            );
        }
        section("selection", self.selection.validate());
        if self.pipeline.max_concurrency == 0 {
            section(
                "pipeline",
                Err("max_concurrency must be at least 1".to_string()),
            );
        }
        if self.storage.path.as_os_str().is_empty() {
            section("storage", Err("path cannot be empty".to_string()));
        }
        section("logging", self.logging.validate());

        for (name, provider) in &self.providers {
            if let Err(e) = provider.validate() {
                errors.push(ValidationError::Provider(name.clone(), e));
            }
        }

        match &self.generation.provider {
            Some(name) if !self.providers.contains_key(name) => {
                errors.push(ValidationError::Section(
                    "generation",
                    format!("provider '{}' is not defined under [providers]", name),
                ));
            }
            None if self.providers.len() > 1 => {
                errors.push(ValidationError::Section(
                    "generation",
                    "several providers are defined; set generation.provider".to_string(),
                ));
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`validate`](Self::validate) folded into one configuration error.
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::Configuration(format!(
                "Configuration validation failed:\n{}",
                lines.join("\n")
            ))
        })
    }
}
