//! Thinking skill catalog: the immutable registry of 33 skills in five ordered categories.

use crate::error::ApiError;
use crate::lesson::BlockType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// Skill category, ordered by cognitive complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillColor {
    Green,
    Blue,
    Yellow,
    Orange,
    Red,
}

impl SkillColor {
    pub const ALL: [SkillColor; 5] = [
        SkillColor::Green,
        SkillColor::Blue,
        SkillColor::Yellow,
        SkillColor::Orange,
        SkillColor::Red,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillColor::Green => "Green",
            SkillColor::Blue => "Blue",
            SkillColor::Yellow => "Yellow",
            SkillColor::Orange => "Orange",
            SkillColor::Red => "Red",
        }
    }

    /// Human-readable category name shown to teachers.
    pub fn category_name(self) -> &'static str {
        match self {
            SkillColor::Green => "Getting Started",
            SkillColor::Blue => "Organizing Ideas",
            SkillColor::Yellow => "Critical Thinking",
            SkillColor::Orange => "Communicating Understanding",
            SkillColor::Red => "Applying Knowledge",
        }
    }

    /// Block type used for skills of this category. Green has no template
    /// preference of its own and uses MapIt.
    pub fn block_type(self) -> BlockType {
        match self {
            SkillColor::Green | SkillColor::Blue => BlockType::MapIt,
            SkillColor::Yellow | SkillColor::Orange => BlockType::SayIt,
            SkillColor::Red => BlockType::BuildIt,
        }
    }

    /// Whether a block of `block_type` may carry a skill of this category.
    /// Green is neutral and takes any type; the rest keep their own.
    pub fn allows_block_type(self, block_type: BlockType) -> bool {
        self == SkillColor::Green || self.block_type() == block_type
    }
}

impl fmt::Display for SkillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillColor::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown skill color: {}", s))
    }
}

/// One thinking skill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingSkill {
    pub name: String,
    pub color: SkillColor,
    pub description: String,
    pub icon_url: String,
    /// Selection weight within the category; higher is preferred.
    pub priority: u32,
    pub example_question: String,
    #[serde(default)]
    pub media_suggestion: Option<String>,
}

impl ThinkingSkill {
    pub fn block_type(&self) -> BlockType {
        self.color.block_type()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    skills: Vec<ThinkingSkill>,
}

/// Read-only skill registry, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    /// Skills per category (indexed by `SkillColor::index`), sorted by
    /// priority descending then name ascending.
    by_color: [Vec<ThinkingSkill>; 5],
}

impl SkillCatalog {
    pub const EXPECTED_SKILLS: usize = 33;

    /// Load the catalog compiled into the binary.
    pub fn builtin() -> Result<Self, ApiError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Load a catalog file; any violation is a fatal configuration error.
    pub fn load_from_file(path: &Path) -> Result<Self, ApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Configuration(format!(
                "Failed to read skill catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded skill catalog from file");
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ApiError> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| ApiError::Configuration(format!("Invalid skill catalog: {}", e)))?;
        Self::from_skills(file.skills)
    }

    pub fn from_skills(skills: Vec<ThinkingSkill>) -> Result<Self, ApiError> {
        if skills.len() != Self::EXPECTED_SKILLS {
            return Err(ApiError::Configuration(format!(
                "Skill catalog must define exactly {} skills, found {}",
                Self::EXPECTED_SKILLS,
                skills.len()
            )));
        }

        let mut seen = HashSet::new();
        for skill in &skills {
            let name = skill.name.trim();
            if name.is_empty() {
                return Err(ApiError::Configuration(
                    "Skill catalog contains a skill with an empty name".to_string(),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(ApiError::Configuration(format!(
                    "Skill catalog defines '{}' more than once",
                    name
                )));
            }
            if skill.description.trim().is_empty() {
                return Err(ApiError::Configuration(format!(
                    "Skill '{}' has an empty description",
                    name
                )));
            }
            if skill.icon_url.trim().is_empty() {
                return Err(ApiError::Configuration(format!(
                    "Skill '{}' has no icon reference",
                    name
                )));
            }
        }

        let mut by_color: [Vec<ThinkingSkill>; 5] = Default::default();
        for skill in skills {
            by_color[skill.color.index()].push(skill);
        }

        for color in SkillColor::ALL {
            let bucket = &mut by_color[color.index()];
            if bucket.is_empty() {
                return Err(ApiError::Configuration(format!(
                    "Skill catalog has no skills in category {}",
                    color
                )));
            }
            bucket.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.name.cmp(&b.name))
            });
        }

        Ok(Self { by_color })
    }

    /// Skills of one category in selection order.
    pub fn skills_in_category(&self, color: SkillColor) -> &[ThinkingSkill] {
        &self.by_color[color.index()]
    }

    pub fn all_categories(&self) -> [SkillColor; 5] {
        SkillColor::ALL
    }

    pub fn skill(&self, name: &str) -> Option<&ThinkingSkill> {
        self.iter().find(|skill| skill.name == name)
    }

    /// All skills, category by category.
    pub fn iter(&self) -> impl Iterator<Item = &ThinkingSkill> {
        self.by_color.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_color.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
