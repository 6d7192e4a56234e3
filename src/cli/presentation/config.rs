//! `config validate` presentation.

use crate::config::PlannerConfig;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

pub fn format_config_summary(config: &PlannerConfig) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Setting", "Value"]);

    let provider = match config.generation_provider() {
        Some(name) => match config.providers.get(name) {
            Some(p) => format!("{} ({} / {})", name, p.provider_type, p.model),
            None => name.to_string(),
        },
        None => "(none)".to_string(),
    };
    let corpus = config
        .retrieval
        .corpus_dir
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let timeout = match config.pipeline.request_timeout() {
        Some(t) => format!("{}s", t.as_secs()),
        None => "none".to_string(),
    };

    let rows = [
        ("Generation provider", provider),
        ("Providers defined", config.providers.len().to_string()),
        (
            "Retrieval backend",
            format!("{:?}", config.retrieval.backend).to_lowercase(),
        ),
        ("Corpus", corpus),
        (
            "Retrieval top_k / min_score",
            format!("{} / {}", config.retrieval.top_k, config.retrieval.min_score),
        ),
        (
            "Selection stretch / span",
            format!("{} / {}", config.selection.stretch, config.selection.span),
        ),
        (
            "Max concurrency",
            config.pipeline.max_concurrency.to_string(),
        ),
        ("Request timeout", timeout),
        ("Lesson store", config.storage.path.display().to_string()),
    ];
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value]);
    }
    format!("Configuration is valid.\n\n{}", table)
}
