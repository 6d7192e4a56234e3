//! Layered configuration loading: defaults, global file, workspace files, environment.

use super::test_utils::with_isolated_env;
use std::path::Path;
use tempfile::TempDir;
use thinkblocks::config::{ConfigLoader, EmbedderKind, ProviderType, RetrievalBackend};
use thinkblocks::error::ApiError;
use thinkblocks::logging::LogFormat;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn defaults_apply_without_any_file() {
    let dir = TempDir::new().unwrap();
    with_isolated_env(&dir, || {
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();
        let config = ConfigLoader::load(&workspace).unwrap();

        assert!(config.providers.is_empty());
        assert_eq!(config.pipeline.max_concurrency, 4);
        assert_eq!(config.pipeline.request_timeout_secs, 90);
        assert_eq!(config.retrieval.backend, RetrievalBackend::Memory);
        assert_eq!(config.retrieval.embedder, EmbedderKind::Hashing);
        assert_eq!(config.selection.stretch, 1);
        assert_eq!(config.selection.span, 3);
        assert_eq!(config.storage.path, workspace.join(".thinkblocks/lessons"));
    });
}

#[test]
fn global_file_is_read_from_xdg_config_home() {
    let dir = TempDir::new().unwrap();
    with_isolated_env(&dir, || {
        let global = ConfigLoader::global_config_path().unwrap();
        assert_eq!(global, dir.path().join("xdg/thinkblocks/config.toml"));
        write(
            &global,
            r#"
[providers.local]
provider_type = "ollama"
model = "llama3"
endpoint = "http://localhost:11434"
"#,
        );

        let config = ConfigLoader::load(&dir.path().join("ws")).unwrap();
        let provider = config.providers.get("local").unwrap();
        assert_eq!(provider.provider_type, ProviderType::Ollama);
        assert_eq!(config.generation_provider(), Some("local"));
    });
}

#[test]
fn workspace_overrides_global_and_env_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    with_isolated_env(&dir, || {
        let workspace = dir.path().join("ws");
        write(
            &ConfigLoader::global_config_path().unwrap(),
            "[pipeline]\nmax_concurrency = 2\n\n[retrieval]\ntop_k = 7\n",
        );
        write(
            &workspace.join("config/config.toml"),
            "[pipeline]\nmax_concurrency = 6\n\n[logging]\nformat = \"json\"\n",
        );
        write(
            &workspace.join("config/classroom.toml"),
            "[pipeline]\nrequest_timeout_secs = 30\n",
        );
        std::env::set_var("THINKBLOCKS_ENV", "classroom");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.pipeline.max_concurrency, 6);
        assert_eq!(config.pipeline.request_timeout_secs, 30);
        assert_eq!(config.retrieval.top_k, 7);
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn environment_overrides_every_file() {
    let dir = TempDir::new().unwrap();
    with_isolated_env(&dir, || {
        let workspace = dir.path().join("ws");
        write(
            &workspace.join("config/config.toml"),
            "[pipeline]\nmax_concurrency = 6\n",
        );
        std::env::set_var("THINKBLOCKS__PIPELINE__MAX_CONCURRENCY", "9");
        std::env::set_var("THINKBLOCKS__RETRIEVAL__TOP_K", "3");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.pipeline.max_concurrency, 9);
        assert_eq!(config.retrieval.top_k, 3);
    });
}

#[test]
fn partial_retry_table_keeps_remaining_defaults() {
    let dir = TempDir::new().unwrap();
    with_isolated_env(&dir, || {
        let workspace = dir.path().join("ws");
        write(
            &workspace.join("config/config.toml"),
            "[generation.retry]\nmax_attempts = 5\n",
        );
        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.generation.retry.max_attempts, 5);
        assert_eq!(config.generation.retry.initial_backoff_ms, 500);
        assert_eq!(config.generation.retry.max_backoff_ms, 8_000);
    });
}

#[test]
fn every_violation_is_reported_together() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("planner.toml");
    write(
        &file,
        r#"
[generation]
provider = "missing"

[pipeline]
max_concurrency = 0

[retrieval]
min_score = 2.0

[selection]
span = 0
"#,
    );

    let err = ConfigLoader::load_from_file(&file).unwrap_err();
    let ApiError::Configuration(message) = err else {
        panic!("expected configuration error");
    };
    for needle in ["missing", "max_concurrency", "min_score", "span"] {
        assert!(message.contains(needle), "{} not in {}", needle, message);
    }
}

#[test]
fn load_from_file_resolves_paths_beside_the_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("conf/planner.toml");
    write(
        &file,
        "[retrieval]\ncorpus_dir = \"corpus\"\n\n[storage]\npath = \"/var/lib/lessons\"\n",
    );

    let config = ConfigLoader::load_from_file(&file).unwrap();
    assert_eq!(
        config.retrieval.corpus_dir,
        Some(dir.path().join("conf/corpus"))
    );
    assert_eq!(config.storage.path, Path::new("/var/lib/lessons"));
}

#[test]
fn missing_explicit_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ApiError::Configuration(_)));
}
