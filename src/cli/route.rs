//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::api::PlannerApi;
use crate::cli::parse::{Commands, ConfigCommands, OutputFormat};
use crate::cli::presentation::{
    format_config_summary, format_lesson_list, format_lesson_plan, format_skills,
};
use crate::config::{ConfigLoader, PlannerConfig};
use crate::error::{ApiError, StorageError};
use crate::lesson::LessonRequest;
use crate::skills::{SkillCatalog, SkillColor};
use crate::store::{LessonStore, LessonSummary, SledLessonStore};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: loaded configuration plus the tokio
/// runtime async commands run on.
pub struct RunContext {
    config: PlannerConfig,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Load configuration from `config_path` alone, or layered from `workspace_root`.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(config)
    }

    pub fn with_config(config: PlannerConfig) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to start runtime: {}", e)))?;
        Ok(Self { config, runtime })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                grade,
                curriculum,
                subject,
                topic,
                difficulty,
                steps,
                prefer,
                minutes,
                time_flexibility,
                format,
                no_save,
            } => {
                let mut request = LessonRequest::new(
                    grade.as_str(),
                    curriculum.as_str(),
                    subject.as_str(),
                    topic.as_str(),
                )
                .with_difficulty(*difficulty)
                .with_step_count(*steps)
                .with_preferred_blocks(prefer.clone());
                request.time_flexibility = *time_flexibility;
                if let Some(minutes) = minutes {
                    request = request.with_available_time(*minutes, *time_flexibility);
                }
                self.handle_generate(&request, *format, *no_save)
            }
            Commands::Show { lesson_id, format } => {
                let plan = self
                    .open_store()?
                    .get(lesson_id)?
                    .ok_or_else(|| StorageError::LessonNotFound(lesson_id.clone()))?;
                format_lesson_plan(&plan, *format)
            }
            Commands::List { format } => {
                let summaries: Vec<LessonSummary> = self.open_store()?.list()?;
                format_lesson_list(&summaries, *format)
            }
            Commands::Skills { color, format } => self.handle_skills(*color, *format),
            Commands::Config {
                command: ConfigCommands::Validate,
            } => {
                self.config.ensure_valid()?;
                Ok(format_config_summary(&self.config))
            }
        }
    }

    fn handle_generate(
        &self,
        request: &LessonRequest,
        format: OutputFormat,
        no_save: bool,
    ) -> Result<String, ApiError> {
        // Reject bad input before any provider or corpus is set up.
        request.validate()?;
        self.runtime.block_on(async {
            let api = PlannerApi::from_config(&self.config).await?;
            let plan = api.generate_plan(request).await?;
            if !no_save {
                api.save_plan(&plan)?;
            }
            format_lesson_plan(&plan, format)
        })
    }

    fn handle_skills(
        &self,
        color: Option<SkillColor>,
        format: OutputFormat,
    ) -> Result<String, ApiError> {
        let catalog = match &self.config.skills.catalog_file {
            Some(path) => SkillCatalog::load_from_file(path)?,
            None => SkillCatalog::builtin()?,
        };
        let skills: Vec<_> = match color {
            Some(color) => catalog.skills_in_category(color).iter().collect(),
            None => catalog.iter().collect(),
        };
        format_skills(&skills, format)
    }

    fn open_store(&self) -> Result<SledLessonStore, ApiError> {
        if let Some(parent) = self.config.storage.path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        Ok(SledLessonStore::new(&self.config.storage.path)?)
    }
}
