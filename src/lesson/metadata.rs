//! Lesson metadata aggregation.

use crate::lesson::{Block, BlockType, LessonMetadata};
use crate::skills::SkillSelection;

/// Sum of per-type average minutes, rendered as "{n} minutes".
pub fn estimated_duration<'a>(block_types: impl IntoIterator<Item = &'a BlockType>) -> String {
    let minutes: u32 = block_types
        .into_iter()
        .map(|block_type| block_type.profile().average_minutes)
        .sum();
    format!("{} minutes", minutes)
}

pub fn build_metadata(
    selection: &SkillSelection,
    blocks: &[Block],
    fallback_blocks: usize,
) -> LessonMetadata {
    let mut skills_used: Vec<String> = Vec::with_capacity(selection.skills.len());
    for skill in &selection.skills {
        if !skills_used.contains(&skill.name) {
            skills_used.push(skill.name.clone());
        }
    }

    LessonMetadata {
        skills_used,
        cognitive_progression: blocks.iter().map(|block| block.skill.color).collect(),
        estimated_duration: estimated_duration(blocks.iter().map(|block| &block.block_type)),
        difficulty_level: selection.difficulty_level.to_string(),
        fallback_blocks,
        time_fit: selection.time_fit.clone(),
    }
}
