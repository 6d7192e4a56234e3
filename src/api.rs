//! Planner API
//!
//! The inbound surface: wires configuration into the pipeline, generates
//! plans and reads/writes them through a [`LessonStore`]. Persistence is a
//! separate call so a caller can generate without saving.

use crate::config::{EmbedderKind, PlannerConfig, RetrievalBackend};
use crate::error::{ApiError, StorageError};
use crate::generation::{BlockGenerator, GeneratorSettings};
use crate::lesson::{AssemblerConfig, LessonAssembler, LessonPlan, LessonRequest};
use crate::prompt::{PromptBuilder, TemplateSet};
use crate::provider::{CompletionOptions, ModelProviderClient, ProviderRegistry};
use crate::retrieval::{
    ContextRetriever, Embedder, HashingEmbedder, HttpVectorStore, InMemoryVectorStore,
    OpenAIEmbedder, RetrieverSettings, VectorStore,
};
use crate::skills::{SkillCatalog, SkillSelector};
use crate::store::{LessonStore, LessonSummary, SledLessonStore};
use std::sync::Arc;
use tracing::{debug, info};

pub struct PlannerApi {
    assembler: Arc<LessonAssembler>,
    store: Arc<dyn LessonStore>,
    catalog: Arc<SkillCatalog>,
}

impl PlannerApi {
    pub fn new(
        assembler: Arc<LessonAssembler>,
        store: Arc<dyn LessonStore>,
        catalog: Arc<SkillCatalog>,
    ) -> Self {
        Self {
            assembler,
            store,
            catalog,
        }
    }

    /// Everything from configuration: the generation provider from
    /// `providers`, a sled lesson store at `storage.path`.
    pub async fn from_config(config: &PlannerConfig) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let provider_name = config.generation_provider().ok_or_else(|| {
            ApiError::ProviderNotConfigured(
                "no generation provider configured; add one under [providers]".to_string(),
            )
        })?;
        let registry = ProviderRegistry::from_config(&config.providers);
        let provider = registry.create_client(provider_name)?;
        let default_options = registry
            .get_or_error(provider_name)?
            .default_options
            .clone();

        if let Some(parent) = config.storage.path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let store: Arc<dyn LessonStore> = Arc::new(SledLessonStore::new(&config.storage.path)?);

        info!(
            provider = provider_name,
            model = provider.model_name(),
            "Planner configured"
        );
        Self::with_collaborators(config, provider, default_options, store).await
    }

    /// Configuration for everything except the generation backend and the
    /// lesson store, which the caller supplies.
    pub async fn with_collaborators(
        config: &PlannerConfig,
        provider: Arc<dyn ModelProviderClient>,
        default_options: CompletionOptions,
        store: Arc<dyn LessonStore>,
    ) -> Result<Self, ApiError> {
        let catalog = Arc::new(match &config.skills.catalog_file {
            Some(path) => SkillCatalog::load_from_file(path)?,
            None => SkillCatalog::builtin()?,
        });
        let templates = Arc::new(match &config.prompts.templates_file {
            Some(path) => TemplateSet::load_from_file(path)?,
            None => TemplateSet::builtin()?,
        });

        let embedder = build_embedder(config)?;
        let vector_store = build_vector_store(config, embedder.as_ref()).await?;
        let retriever = ContextRetriever::new(
            embedder,
            vector_store,
            RetrieverSettings {
                top_k: config.retrieval.top_k,
                min_score: config.retrieval.min_score,
                dedup_threshold: config.retrieval.dedup_threshold,
                token_budget: config.retrieval.token_budget,
                retry: config.retrieval.retry,
            },
        );

        let generator = BlockGenerator::new(
            provider,
            GeneratorSettings {
                retry: config.generation.retry,
                media_base_url: config.generation.media_base_url.clone(),
                default_options,
            },
        );

        let assembler = LessonAssembler::new(
            Arc::new(SkillSelector::new(catalog.clone(), config.selection)),
            Arc::new(retriever),
            Arc::new(PromptBuilder::new(
                templates,
                config.prompts.context_token_budget,
            )),
            Arc::new(generator),
            AssemblerConfig {
                max_concurrency: config.pipeline.max_concurrency,
                request_timeout: config.pipeline.request_timeout(),
                top_k: config.retrieval.top_k,
                min_score: config.retrieval.min_score,
            },
        );

        Ok(Self::new(Arc::new(assembler), store, catalog))
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    pub fn assembler(&self) -> &LessonAssembler {
        &self.assembler
    }

    /// Assemble a plan. Nothing is stored.
    pub async fn generate_plan(&self, request: &LessonRequest) -> Result<LessonPlan, ApiError> {
        self.assembler.assemble(request).await
    }

    pub fn save_plan(&self, plan: &LessonPlan) -> Result<(), ApiError> {
        self.store.save(plan)?;
        debug!(lesson_id = %plan.lesson_id, "Lesson plan saved");
        Ok(())
    }

    pub fn get_plan(&self, lesson_id: &str) -> Result<LessonPlan, ApiError> {
        self.store
            .get(lesson_id)?
            .ok_or_else(|| StorageError::LessonNotFound(lesson_id.to_string()).into())
    }

    pub fn list_plans(&self) -> Result<Vec<LessonSummary>, ApiError> {
        Ok(self.store.list()?)
    }
}

fn build_embedder(config: &PlannerConfig) -> Result<Arc<dyn Embedder>, ApiError> {
    let retrieval = &config.retrieval;
    match retrieval.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(retrieval.embedding_dim))),
        EmbedderKind::OpenAI => {
            let api_key = retrieval
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    ApiError::Configuration(
                        "The openai embedder needs retrieval.api_key or OPENAI_API_KEY"
                            .to_string(),
                    )
                })?;
            let model = retrieval
                .embedding_model
                .clone()
                .unwrap_or_else(|| OpenAIEmbedder::DEFAULT_MODEL.to_string());
            Ok(Arc::new(OpenAIEmbedder::new(model, api_key, None)?))
        }
    }
}

async fn build_vector_store(
    config: &PlannerConfig,
    embedder: &dyn Embedder,
) -> Result<Arc<dyn VectorStore>, ApiError> {
    let retrieval = &config.retrieval;
    match retrieval.backend {
        RetrievalBackend::Http => {
            let endpoint = retrieval.endpoint.clone().ok_or_else(|| {
                ApiError::Configuration("The http retrieval backend needs an endpoint".to_string())
            })?;
            Ok(Arc::new(HttpVectorStore::new(
                endpoint,
                retrieval.api_key.clone(),
            )?))
        }
        RetrievalBackend::Memory => match &retrieval.corpus_dir {
            Some(dir) => Ok(Arc::new(
                InMemoryVectorStore::from_corpus_dir(dir, embedder).await?,
            )),
            None => {
                debug!("No retrieval corpus configured; prompts carry no curriculum context");
                Ok(Arc::new(InMemoryVectorStore::empty()))
            }
        },
    }
}
