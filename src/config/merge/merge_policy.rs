//! Merge rules: defaults, override order, conflict handling.
//!
//! Nested tables without a serde default of their own get every key seeded
//! here, so a file that overrides one retry field keeps the rest.

use crate::retry::RetryPolicy;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

fn retry_defaults(
    builder: ConfigBuilder<DefaultState>,
    section: &str,
    policy: RetryPolicy,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default(format!("{}.retry.max_attempts", section), policy.max_attempts as i64)?
        .set_default(
            format!("{}.retry.initial_backoff_ms", section),
            policy.initial_backoff_ms as i64,
        )?
        .set_default(
            format!("{}.retry.max_backoff_ms", section),
            policy.max_backoff_ms as i64,
        )?
        .set_default(format!("{}.retry.multiplier", section), policy.multiplier)
}

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = Config::builder()
        .set_default("storage.path", ".thinkblocks/lessons")?
        .set_default("pipeline.max_concurrency", 4)?
        .set_default("pipeline.request_timeout_secs", 90)?;
    let builder = retry_defaults(builder, "generation", RetryPolicy::generation_default())?;
    retry_defaults(builder, "retrieval", RetryPolicy::retrieval_default())
}
