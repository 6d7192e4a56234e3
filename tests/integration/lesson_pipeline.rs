//! End-to-end lesson assembly over scripted collaborators.

use super::test_utils::assembler;
use std::sync::Arc;
use std::time::Duration;
use thinkblocks::error::ApiError;
use thinkblocks::lesson::{
    AssemblerConfig, AssemblyState, BlockId, BlockType, LessonRequest, TimeFlexibility,
};
use thinkblocks::prompt::NO_CONTEXT_PLACEHOLDER;
use thinkblocks::skills::{DifficultyPolicy, SkillCatalog, SkillColor, SkillSelector};
use thinkblocks::testing::{
    EmptyVectorStore, FailingVectorStore, ScriptedProvider, StallingVectorStore,
    StaticVectorStore,
};

fn request(difficulty: f64, steps: usize) -> LessonRequest {
    LessonRequest::new("Year 4", "Australian Curriculum", "Science", "Plant Life Cycles")
        .with_difficulty(difficulty)
        .with_step_count(steps)
}

/// Skill names the selector will pick, in step order.
fn planned_skills(difficulty: f64, steps: usize) -> Vec<String> {
    let selector = SkillSelector::new(
        Arc::new(SkillCatalog::builtin().unwrap()),
        DifficultyPolicy::default(),
    );
    selector
        .select(difficulty, steps)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect()
}

fn is_non_decreasing(progression: &[SkillColor]) -> bool {
    progression.windows(2).all(|w| w[0] <= w[1])
}

#[tokio::test]
async fn mid_difficulty_lesson_climbs_blue_to_red() {
    let provider = Arc::new(ScriptedProvider::new());
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );

    let report = assembler
        .assemble_report(&request(0.6, 3), "lesson-mid")
        .await
        .unwrap();
    let plan = report.plan;

    assert_eq!(plan.blocks.len(), 3);
    assert_eq!(
        plan.metadata.cognitive_progression,
        vec![SkillColor::Blue, SkillColor::Yellow, SkillColor::Red]
    );
    let types: Vec<BlockType> = plan.blocks.iter().map(|b| b.block_type).collect();
    assert_eq!(types, vec![BlockType::MapIt, BlockType::SayIt, BlockType::BuildIt]);
    assert_eq!(plan.metadata.estimated_duration, "33 minutes");
    assert_eq!(plan.metadata.difficulty_level, "Advanced");
    assert_eq!(plan.metadata.fallback_blocks, 0);
    assert_eq!(plan.metadata.skills_used, planned_skills(0.6, 3));
    assert_eq!(plan.curriculum, "Australian Curriculum");
    assert_eq!(plan.difficulty, 0.6);
    assert_eq!(provider.call_count(), 3);

    assert_eq!(
        report.log.states(),
        &[
            AssemblyState::SelectingSkills,
            AssemblyState::RetrievingContext,
            AssemblyState::GeneratingBlocks,
            AssemblyState::Assembled,
        ]
    );
    assert!(!report.timed_out);
    assert_eq!(report.attempts, vec![1, 1, 1]);
}

#[tokio::test]
async fn easiest_single_step_lesson_is_green() {
    let assembler = assembler(
        Arc::new(ScriptedProvider::new()),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(0.0, 1)).await.unwrap();

    assert_eq!(plan.metadata.cognitive_progression, vec![SkillColor::Green]);
    assert_eq!(plan.blocks[0].block_type, BlockType::MapIt);
    assert_eq!(plan.metadata.estimated_duration, "10 minutes");
    assert_eq!(plan.metadata.difficulty_level, "Foundational");
}

#[tokio::test]
async fn hardest_lesson_never_regresses() {
    let assembler = assembler(
        Arc::new(ScriptedProvider::new()),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(1.0, 5)).await.unwrap();

    let progression = &plan.metadata.cognitive_progression;
    assert_eq!(
        progression,
        &vec![
            SkillColor::Blue,
            SkillColor::Blue,
            SkillColor::Yellow,
            SkillColor::Orange,
            SkillColor::Red
        ]
    );
    assert!(is_non_decreasing(progression));
    let skills: Vec<&str> = plan.blocks.iter().map(|b| b.skill.name.as_str()).collect();
    assert_ne!(skills[0], skills[1], "two Blue steps use distinct skills");
}

#[tokio::test]
async fn empty_retrieval_still_generates_skill_only_blocks() {
    let provider = Arc::new(ScriptedProvider::new());
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(0.5, 2)).await.unwrap();

    assert_eq!(plan.metadata.fallback_blocks, 0);
    for prompt in provider.prompts() {
        assert!(prompt.contains(NO_CONTEXT_PLACEHOLDER));
    }
    for (block, skill) in plan.blocks.iter().zip(planned_skills(0.5, 2)) {
        assert_eq!(block.title, format!("{} Challenge", skill));
    }
}

#[tokio::test]
async fn retrieved_context_reaches_every_prompt() {
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(StaticVectorStore::from_texts(&[
        ("Seeds need water, warmth and air to germinate.", 0.9),
        ("Pollination moves pollen between flowers.", 0.7),
    ]));
    let assembler = assembler(provider.clone(), store.clone(), AssemblerConfig::default());
    assembler.assemble(&request(0.6, 3)).await.unwrap();

    assert_eq!(store.search_count(), 3, "one search per step");
    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 3);
    for prompt in prompts {
        assert!(prompt.contains("[doc-0] Seeds need water"));
        assert!(prompt.contains("[doc-1] Pollination"));
        assert!(!prompt.contains(NO_CONTEXT_PLACEHOLDER));
    }
}

#[tokio::test(start_paused = true)]
async fn retrieval_failure_degrades_to_no_context() {
    let provider = Arc::new(ScriptedProvider::new());
    let assembler = assembler(
        provider.clone(),
        Arc::new(FailingVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(0.6, 3)).await.unwrap();

    assert_eq!(plan.metadata.fallback_blocks, 0);
    assert!(provider
        .prompts()
        .iter()
        .all(|p| p.contains(NO_CONTEXT_PLACEHOLDER)));
}

#[tokio::test(start_paused = true)]
async fn invalid_output_for_one_step_falls_back_alone() {
    let skills = planned_skills(0.6, 3);
    let provider = Arc::new(ScriptedProvider::new().with_invalid(&skills[1]));
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );

    let report = assembler
        .assemble_report(&request(0.6, 3), "lesson-fallback")
        .await
        .unwrap();
    let plan = report.plan;

    assert_eq!(plan.blocks.len(), 3);
    assert_eq!(plan.metadata.fallback_blocks, 1);
    assert_eq!(report.attempts, vec![1, 3, 1]);
    assert_eq!(plan.blocks[0].title, format!("{} Challenge", skills[0]));
    assert_eq!(plan.blocks[1].title, format!("{} Activity", skills[1]));
    assert_eq!(plan.blocks[1].steps.len(), 1);
    assert!(plan.blocks[1].media.is_empty());
    assert_eq!(plan.blocks[2].title, format!("{} Challenge", skills[2]));
    assert!(!report.timed_out);

    let calls = provider.calls();
    assert_eq!(calls.iter().filter(|s| **s == skills[1]).count(), 3);
}

#[tokio::test(start_paused = true)]
async fn all_invalid_output_yields_a_full_fallback_plan() {
    let assembler = assembler(
        Arc::new(ScriptedProvider::always_invalid()),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(0.4, 4)).await.unwrap();

    assert_eq!(plan.blocks.len(), 4);
    assert_eq!(plan.metadata.fallback_blocks, 4);
    assert!(plan.blocks.iter().all(|b| b.title.ends_with(" Activity")));
    assert!(is_non_decreasing(&plan.metadata.cognitive_progression));
}

#[tokio::test(start_paused = true)]
async fn completion_order_does_not_reorder_blocks() {
    let skills = planned_skills(0.6, 3);
    // First step finishes last, last step first.
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_delay(&skills[0], Duration::from_millis(300))
            .with_delay(&skills[1], Duration::from_millis(200))
            .with_delay(&skills[2], Duration::from_millis(100)),
    );
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );

    let report = assembler
        .assemble_report(&request(0.6, 3), "lesson-order")
        .await
        .unwrap();
    let names: Vec<&str> = report
        .plan
        .blocks
        .iter()
        .map(|b| b.skill.name.as_str())
        .collect();
    assert_eq!(names, skills.iter().map(String::as_str).collect::<Vec<_>>());
    for (index, block) in report.plan.blocks.iter().enumerate() {
        assert_eq!(block.id, BlockId::for_step("lesson-order", index));
    }
}

#[tokio::test(start_paused = true)]
async fn same_inputs_give_the_same_plan() {
    let run = || async {
        let assembler = assembler(
            Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_millis(5))),
            Arc::new(StaticVectorStore::from_texts(&[("Roots absorb water.", 0.8)])),
            AssemblerConfig::default(),
        );
        assembler
            .assemble_report(&request(0.7, 4), "lesson-repeat")
            .await
            .unwrap()
            .plan
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.blocks, second.blocks);
    assert_eq!(first.metadata, second.metadata);
}

#[tokio::test(start_paused = true)]
async fn deadline_with_no_finished_step_is_a_timeout() {
    let assembler = assembler(
        Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_secs(60))),
        Arc::new(EmptyVectorStore),
        AssemblerConfig {
            request_timeout: Some(Duration::from_secs(5)),
            ..AssemblerConfig::default()
        },
    );

    let err = assembler.assemble(&request(0.6, 3)).await.unwrap_err();
    match err {
        ApiError::AssemblyTimeout {
            elapsed_ms,
            completed,
            total,
        } => {
            assert!(elapsed_ms >= 5_000, "elapsed follows the tokio clock: {}", elapsed_ms);
            assert_eq!(completed, 0);
            assert_eq!(total, 3);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_replaces_only_unfinished_steps() {
    let skills = planned_skills(0.6, 3);
    let provider = ScriptedProvider::new()
        .with_default_delay(Duration::from_secs(60))
        .with_delay(&skills[0], Duration::from_millis(10));
    let assembler = assembler(
        Arc::new(provider),
        Arc::new(EmptyVectorStore),
        AssemblerConfig {
            request_timeout: Some(Duration::from_secs(5)),
            ..AssemblerConfig::default()
        },
    );

    let report = assembler
        .assemble_report(&request(0.6, 3), "lesson-partial")
        .await
        .unwrap();
    assert!(report.timed_out);
    assert_eq!(report.plan.metadata.fallback_blocks, 2);
    assert_eq!(report.plan.blocks[0].title, format!("{} Challenge", skills[0]));
    assert_eq!(report.plan.blocks[1].title, format!("{} Activity", skills[1]));
    assert_eq!(report.plan.blocks[2].title, format!("{} Activity", skills[2]));
}

#[tokio::test]
async fn invalid_request_never_reaches_the_backend() {
    let provider = Arc::new(ScriptedProvider::new());
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );

    for bad in [request(1.5, 3), request(0.5, 0), request(0.5, 11)] {
        let err = assembler.assemble(&bad).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(err.is_client_error());
    }
    let blank = LessonRequest::new("Year 4", "NSW", "Science", "   ");
    assert!(matches!(
        assembler.assemble(&blank).await,
        Err(ApiError::InvalidRequest(_))
    ));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_worker_still_completes_every_step() {
    let provider = Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_millis(50)));
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig {
            max_concurrency: 1,
            ..AssemblerConfig::default()
        },
    );
    let plan = assembler.assemble(&request(0.8, 6)).await.unwrap();
    assert_eq!(plan.blocks.len(), 6);
    assert_eq!(plan.metadata.fallback_blocks, 0);
    assert_eq!(provider.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn stalled_retrieval_holds_up_only_its_own_step() {
    let provider = Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_millis(100)));
    let assembler = assembler(
        provider.clone(),
        Arc::new(StallingVectorStore::new(Duration::from_secs(600))),
        AssemblerConfig {
            request_timeout: Some(Duration::from_secs(5)),
            ..AssemblerConfig::default()
        },
    );

    let report = assembler
        .assemble_report(&request(0.6, 3), "lesson-stalled")
        .await
        .unwrap();
    assert!(report.timed_out);
    assert_eq!(report.plan.blocks.len(), 3);
    assert_eq!(report.plan.metadata.fallback_blocks, 1);
    let generated = report
        .plan
        .blocks
        .iter()
        .filter(|b| b.title.ends_with("Challenge"))
        .count();
    assert_eq!(generated, 2);
    assert_eq!(
        report.log.states(),
        &[
            AssemblyState::SelectingSkills,
            AssemblyState::RetrievingContext,
            AssemblyState::GeneratingBlocks,
            AssemblyState::Assembled
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrency_limit_bounds_backend_calls_in_flight() {
    for limit in [1, 2] {
        let provider =
            Arc::new(ScriptedProvider::new().with_default_delay(Duration::from_millis(50)));
        let assembler = assembler(
            provider.clone(),
            Arc::new(EmptyVectorStore),
            AssemblerConfig {
                max_concurrency: limit,
                ..AssemblerConfig::default()
            },
        );
        let plan = assembler.assemble(&request(0.8, 6)).await.unwrap();
        assert_eq!(plan.blocks.len(), 6);
        assert_eq!(provider.call_count(), 6);
        assert!(
            provider.peak_in_flight() <= limit,
            "peak {} over limit {}",
            provider.peak_in_flight(),
            limit
        );
        assert_eq!(provider.peak_in_flight(), limit);
    }
}

#[tokio::test]
async fn one_step_lesson_matches_its_difficulty_label() {
    let assembler = assembler(
        Arc::new(ScriptedProvider::new()),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let plan = assembler.assemble(&request(1.0, 1)).await.unwrap();
    assert_eq!(plan.metadata.cognitive_progression, vec![SkillColor::Red]);
    assert_eq!(plan.metadata.difficulty_level, "Mastery");
}

#[tokio::test]
async fn block_preferences_and_time_shape_the_plan() {
    let provider = Arc::new(ScriptedProvider::always_invalid());
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    // 0.1 with 4 steps runs Green, Green, Blue, Blue.
    let request = request(0.1, 4)
        .with_preferred_blocks(vec![BlockType::BuildIt, BlockType::MapIt, BlockType::BuildIt])
        .with_available_time(40, TimeFlexibility::Strict);

    let plan = assembler.assemble(&request).await.unwrap();
    let types: Vec<BlockType> = plan.blocks.iter().map(|b| b.block_type).collect();
    assert_eq!(
        types,
        vec![BlockType::BuildIt, BlockType::MapIt, BlockType::MapIt, BlockType::MapIt]
    );
    assert!(provider.prompts().iter().any(|p| p.contains("BuildIt")));
    assert_eq!(plan.metadata.estimated_duration, "45 minutes");

    let fit = plan.metadata.time_fit.expect("time fit reported");
    assert_eq!(fit.available_minutes, 40);
    assert_eq!(fit.estimated_minutes, 45);
    assert!(fit.shortened_steps.is_empty());
    assert!(!fit.fits());
}

#[tokio::test]
async fn too_little_time_for_the_steps_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new());
    let assembler = assembler(
        provider.clone(),
        Arc::new(EmptyVectorStore),
        AssemblerConfig::default(),
    );
    let err = assembler
        .assemble(&request(0.5, 5).with_available_time(20, TimeFlexibility::Moderate))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(provider.call_count(), 0);
}
