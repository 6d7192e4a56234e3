//! Lesson plan presentation: full plan and stored-plan listing.

use super::to_json;
use crate::cli::parse::OutputFormat;
use crate::error::ApiError;
use crate::lesson::{Block, LessonPlan};
use crate::store::LessonSummary;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

pub fn format_lesson_plan(plan: &LessonPlan, format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(plan);
    }

    let mut out = format!(
        "{} ({}, {}, {})\nLesson: {}\n",
        plan.topic, plan.grade, plan.subject, plan.curriculum, plan.lesson_id
    );
    out.push_str(&format!(
        "Difficulty: {:.2} ({})  Duration: {}\n",
        plan.difficulty, plan.metadata.difficulty_level, plan.metadata.estimated_duration
    ));
    let progression: Vec<&str> = plan
        .metadata
        .cognitive_progression
        .iter()
        .map(|c| c.as_str())
        .collect();
    out.push_str(&format!("Progression: {}\n", progression.join(" -> ")));
    if plan.metadata.fallback_blocks > 0 {
        out.push_str(&format!(
            "Fallback blocks: {}\n",
            plan.metadata.fallback_blocks
        ));
    }
    if let Some(fit) = &plan.metadata.time_fit {
        out.push_str(&format!(
            "Time: {} of {} minutes ({}{})\n",
            fit.estimated_minutes,
            fit.available_minutes,
            fit.flexibility,
            if fit.fits() { "" } else { ", over" }
        ));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Type", "Skill", "Activity"]);
    for (index, block) in plan.blocks.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            block.block_type.to_string(),
            format!("{} ({})", block.skill.name, block.skill.color),
            block_cell(block),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());
    Ok(out)
}

fn block_cell(block: &Block) -> String {
    let mut cell = format!("{}\n{}\n", block.title, block.description);
    for (i, step) in block.steps.iter().enumerate() {
        cell.push_str(&format!("{}. {}\n", i + 1, step));
    }
    cell.push_str(&format!("? {}", block.supporting_question));
    for (label, items) in [
        ("Sentence starters", &block.sentence_starters),
        ("Materials", &block.materials),
        ("Media", &block.media),
    ] {
        if !items.is_empty() {
            cell.push_str(&format!("\n{}: {}", label, items.join(", ")));
        }
    }
    cell
}

pub fn format_lesson_list(
    summaries: &[LessonSummary],
    format: OutputFormat,
) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(summaries);
    }
    if summaries.is_empty() {
        return Ok("No stored lessons.\n\nUse 'thinkblocks generate' to create one.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Lesson", "Topic", "Grade", "Subject", "Blocks", "Level", "Generated",
    ]);
    for s in summaries {
        table.add_row(vec![
            s.lesson_id.clone(),
            s.topic.clone(),
            s.grade.clone(),
            s.subject.clone(),
            s.block_count.to_string(),
            s.difficulty_level.clone(),
            s.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    Ok(format!("{}\n\nTotal: {} lesson(s)", table, summaries.len()))
}
