//! CLI presentation: text and json formatters per command family.

mod config;
mod lesson;
mod skills;

pub use config::format_config_summary;
pub use lesson::{format_lesson_list, format_lesson_plan};
pub use skills::format_skills;

use crate::error::ApiError;
use serde::Serialize;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::Configuration(format!("Failed to render JSON: {}", e)))
}
