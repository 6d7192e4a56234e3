//! Lesson persistence through the planner API and the sled store.

use std::sync::Arc;
use tempfile::TempDir;
use thinkblocks::config::PlannerConfig;
use thinkblocks::error::{ApiError, StorageError};
use thinkblocks::lesson::LessonRequest;
use thinkblocks::provider::CompletionOptions;
use thinkblocks::store::{InMemoryLessonStore, LessonStore, SledLessonStore};
use thinkblocks::testing::ScriptedProvider;
use thinkblocks::PlannerApi;

fn request(topic: &str) -> LessonRequest {
    LessonRequest::new("Grade 5", "Common Core", "Science", topic).with_difficulty(0.3)
}

async fn api_with(store: Arc<dyn LessonStore>, config: &PlannerConfig) -> PlannerApi {
    PlannerApi::with_collaborators(
        config,
        Arc::new(ScriptedProvider::new()),
        CompletionOptions::default(),
        store,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn generated_plan_round_trips_through_the_store() {
    let api = api_with(Arc::new(InMemoryLessonStore::new()), &PlannerConfig::default()).await;

    let plan = api.generate_plan(&request("Volcanoes")).await.unwrap();
    assert!(api.list_plans().unwrap().is_empty(), "generation does not save");

    api.save_plan(&plan).unwrap();
    let loaded = api.get_plan(&plan.lesson_id).unwrap();
    assert_eq!(loaded, plan);

    let summaries = api.list_plans().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].lesson_id, plan.lesson_id);
    assert_eq!(summaries[0].block_count, 3);
    assert_eq!(summaries[0].difficulty_level, plan.metadata.difficulty_level);
}

#[tokio::test]
async fn unknown_lesson_is_a_client_error() {
    let api = api_with(Arc::new(InMemoryLessonStore::new()), &PlannerConfig::default()).await;
    let err = api.get_plan("no-such-lesson").unwrap_err();
    assert!(matches!(
        err,
        ApiError::StorageError(StorageError::LessonNotFound(ref id)) if id == "no-such-lesson"
    ));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn sled_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lessons");

    let (first, second) = {
        let store = Arc::new(SledLessonStore::new(&path).unwrap());
        let api = api_with(store, &PlannerConfig::default()).await;
        let first = api.generate_plan(&request("Volcanoes")).await.unwrap();
        let second = api.generate_plan(&request("Rivers")).await.unwrap();
        api.save_plan(&first).unwrap();
        api.save_plan(&second).unwrap();
        (first, second)
    };

    let reopened = SledLessonStore::new(&path).unwrap();
    assert_eq!(reopened.get(&first.lesson_id).unwrap(), Some(first.clone()));
    assert_eq!(reopened.get(&second.lesson_id).unwrap(), Some(second.clone()));

    let listed = reopened.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].generated_at >= listed[1].generated_at, "newest first");
}

#[tokio::test]
async fn saving_again_replaces_the_plan() {
    let store = Arc::new(InMemoryLessonStore::new());
    let api = api_with(store.clone(), &PlannerConfig::default()).await;

    let mut plan = api.generate_plan(&request("Magnets")).await.unwrap();
    api.save_plan(&plan).unwrap();
    plan.topic = "Magnetism".to_string();
    api.save_plan(&plan).unwrap();

    assert_eq!(store.list().unwrap().len(), 1);
    assert_eq!(api.get_plan(&plan.lesson_id).unwrap().topic, "Magnetism");
}
