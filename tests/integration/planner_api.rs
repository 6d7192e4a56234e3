//! PlannerApi wiring from configuration: corpus loading, templates, catalog.

use std::sync::Arc;
use tempfile::TempDir;
use thinkblocks::config::PlannerConfig;
use thinkblocks::error::ApiError;
use thinkblocks::lesson::LessonRequest;
use thinkblocks::provider::CompletionOptions;
use thinkblocks::store::InMemoryLessonStore;
use thinkblocks::testing::ScriptedProvider;
use thinkblocks::PlannerApi;

fn corpus(dir: &TempDir) -> std::path::PathBuf {
    let corpus_dir = dir.path().join("corpus");
    std::fs::create_dir_all(corpus_dir.join("science")).unwrap();
    std::fs::write(
        corpus_dir.join("science/plants.json"),
        r#"[
  {"text": "Plant life cycles begin with a seed that germinates in warm, moist soil.",
   "curriculum": "Australian Curriculum", "grade": "Year 4"},
  {"text": "Flowers are pollinated by insects, which lets plants make seeds.",
   "curriculum": "Australian Curriculum", "grade": "Grade 4"},
  {"text": "Plant life cycles in the senior syllabus cover alternation of generations.",
   "curriculum": "Australian Curriculum", "grade": "Year 11"}
]"#,
    )
    .unwrap();
    corpus_dir
}

async fn api(config: &PlannerConfig, provider: Arc<ScriptedProvider>) -> Result<PlannerApi, ApiError> {
    PlannerApi::with_collaborators(
        config,
        provider,
        CompletionOptions::default(),
        Arc::new(InMemoryLessonStore::new()),
    )
    .await
}

#[tokio::test]
async fn corpus_context_is_filtered_by_grade() {
    let dir = TempDir::new().unwrap();
    let mut config = PlannerConfig::default();
    config.retrieval.corpus_dir = Some(corpus(&dir));
    config.retrieval.min_score = 0.0;

    let provider = Arc::new(ScriptedProvider::new());
    let api = api(&config, provider.clone()).await.unwrap();
    let request = LessonRequest::new(
        "Year 4",
        "Australian Curriculum",
        "Science",
        "Plant life cycles",
    );
    let plan = api.generate_plan(&request).await.unwrap();
    assert_eq!(plan.blocks.len(), 3);

    for prompt in provider.prompts() {
        assert!(prompt.contains("[plants] Plant life cycles begin with a seed"));
        assert!(prompt.contains("pollinated by insects"), "Grade 4 matches Year 4");
        assert!(!prompt.contains("senior syllabus"));
    }
}

#[tokio::test]
async fn custom_media_base_adds_skill_media() {
    let mut config = PlannerConfig::default();
    config.generation.media_base_url = Some("https://media.example.org/skills".to_string());

    let api = api(&config, Arc::new(ScriptedProvider::new())).await.unwrap();
    let request = LessonRequest::new("Year 2", "NSW", "Maths", "Shapes")
        .with_difficulty(0.0)
        .with_step_count(1);
    let plan = api.generate_plan(&request).await.unwrap();

    let block = &plan.blocks[0];
    let skill = api.catalog().skill(&block.skill.name).unwrap();
    match &skill.media_suggestion {
        Some(file) => assert_eq!(
            block.media,
            vec![format!("https://media.example.org/skills/{}", file)]
        ),
        None => assert!(block.media.is_empty()),
    }
}

#[tokio::test]
async fn missing_corpus_dir_fails_fast() {
    let dir = TempDir::new().unwrap();
    let mut config = PlannerConfig::default();
    config.retrieval.corpus_dir = Some(dir.path().join("nowhere"));

    let result = api(&config, Arc::new(ScriptedProvider::new())).await;
    assert!(matches!(result, Err(ApiError::Configuration(_))));
}

#[tokio::test]
async fn broken_template_file_fails_fast() {
    let dir = TempDir::new().unwrap();
    let templates = dir.path().join("templates.toml");
    std::fs::write(&templates, "[MapIt]\nbody = \"Just talk about {topic}.\"\n").unwrap();
    let mut config = PlannerConfig::default();
    config.prompts.templates_file = Some(templates);

    let result = api(&config, Arc::new(ScriptedProvider::new())).await;
    assert!(matches!(result, Err(ApiError::Configuration(_))));
}

#[tokio::test]
async fn from_config_requires_a_provider() {
    let dir = TempDir::new().unwrap();
    let mut config = PlannerConfig::default();
    config.storage.path = dir.path().join("lessons");

    let result = PlannerApi::from_config(&config).await;
    assert!(matches!(result, Err(ApiError::ProviderNotConfigured(_))));
}
