use crate::lesson::{Block, BlockId, BlockType, SkillRef};
use crate::skills::ThinkingSkill;

/// Deterministic block used when generation gives up. Depends only on the
/// id, the skill and the block type.
pub fn fallback_block(id: BlockId, skill: &ThinkingSkill, block_type: BlockType) -> Block {
    let profile = block_type.profile();
    Block {
        id,
        block_type,
        title: format!("{} Activity", skill.name),
        description: format!(
            "Practise the '{}' thinking skill: {}",
            skill.name, skill.description
        ),
        steps: vec![profile.fallback_step.to_string()],
        skill: SkillRef::from(skill),
        supporting_question: skill.example_question.clone(),
        media: Vec::new(),
        sentence_starters: Vec::new(),
        materials: Vec::new(),
        target_words: Vec::new(),
        criteria: Vec::new(),
    }
}
