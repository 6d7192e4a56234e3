//! Skill catalog presentation.

use super::to_json;
use crate::cli::parse::OutputFormat;
use crate::error::ApiError;
use crate::skills::ThinkingSkill;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

pub fn format_skills(skills: &[&ThinkingSkill], format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(skills);
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Skill", "Color", "Category", "Block", "Description"]);
    for skill in skills {
        table.add_row(vec![
            skill.name.clone(),
            skill.color.to_string(),
            skill.color.category_name().to_string(),
            skill.block_type().to_string(),
            skill.description.clone(),
        ]);
    }
    Ok(format!("{}\n\nTotal: {} skill(s)", table, skills.len()))
}
