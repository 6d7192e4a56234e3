//! Thinking skills: the catalog, the difficulty policy, and skill selection.

mod catalog;
mod policy;
mod selector;

pub use catalog::{SkillCatalog, SkillColor, ThinkingSkill};
pub use policy::DifficultyPolicy;
pub use selector::{SkillSelection, SkillSelector};
