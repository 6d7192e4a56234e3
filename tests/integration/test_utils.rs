//! Shared test utilities for integration tests
//!
//! Environment-sensitive config tests run under one global mutex with HOME,
//! XDG_CONFIG_HOME and the thinkblocks variables captured and restored.

use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;
use thinkblocks::generation::{BlockGenerator, GeneratorSettings};
use thinkblocks::lesson::{AssemblerConfig, LessonAssembler};
use thinkblocks::prompt::{PromptBuilder, TemplateSet};
use thinkblocks::provider::ModelProviderClient;
use thinkblocks::retrieval::{ContextRetriever, HashingEmbedder, RetrieverSettings, VectorStore};
use thinkblocks::retry::RetryPolicy;
use thinkblocks::skills::{DifficultyPolicy, SkillCatalog, SkillSelector};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

const CAPTURED: [&str; 5] = [
    "HOME",
    "XDG_CONFIG_HOME",
    "THINKBLOCKS_ENV",
    "THINKBLOCKS__PIPELINE__MAX_CONCURRENCY",
    "THINKBLOCKS__RETRIEVAL__TOP_K",
];

/// Environment variable state to restore after test
struct EnvState(Vec<(&'static str, Option<String>)>);

impl EnvState {
    fn capture() -> Self {
        Self(
            CAPTURED
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect(),
        )
    }

    fn restore(self) {
        for (key, value) in self.0 {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Run `f` with XDG_CONFIG_HOME at `test_dir/xdg`, HOME at `test_dir/home`
/// and no thinkblocks overrides set. The environment is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let config_home = test_dir.path().join("xdg");
    let home = test_dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();
    std::fs::create_dir_all(&home).unwrap();

    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    for key in &CAPTURED[2..] {
        std::env::remove_var(key);
    }

    let result = f();
    env_state.restore();
    result
}

/// Assembler over the built-in catalog and templates with fast retries.
pub fn assembler(
    provider: Arc<dyn ModelProviderClient>,
    store: Arc<dyn VectorStore>,
    config: AssemblerConfig,
) -> LessonAssembler {
    let catalog = Arc::new(SkillCatalog::builtin().unwrap());
    let retriever = ContextRetriever::new(
        Arc::new(HashingEmbedder::default()),
        store,
        RetrieverSettings::default(),
    );
    let generator = BlockGenerator::new(
        provider,
        GeneratorSettings {
            retry: RetryPolicy::generation_default(),
            media_base_url: None,
            ..GeneratorSettings::default()
        },
    );
    LessonAssembler::new(
        Arc::new(SkillSelector::new(catalog, DifficultyPolicy::default())),
        Arc::new(retriever),
        Arc::new(PromptBuilder::new(
            Arc::new(TemplateSet::builtin().unwrap()),
            PromptBuilder::DEFAULT_CONTEXT_TOKEN_BUDGET,
        )),
        Arc::new(generator),
        config,
    )
}
