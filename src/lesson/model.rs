//! Lesson request and plan types, matching the public JSON shape.

use crate::error::ApiError;
use crate::lesson::BlockType;
use crate::skills::{SkillColor, ThinkingSkill};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on blocks per lesson.
pub const MAX_STEP_COUNT: usize = 10;

/// Accepted range for `available_time_minutes`.
pub const AVAILABLE_TIME_RANGE: std::ops::RangeInclusive<u32> = 10..=120;

/// Least time a single step can be given.
pub const MIN_MINUTES_PER_STEP: u32 = 5;

/// How hard the available time bounds the lesson.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeFlexibility {
    /// Shortest formats wherever the category allows.
    Strict,
    /// Shorter formats only when the estimate overruns.
    #[default]
    Moderate,
    /// Time is reported, never acted on.
    Flexible,
}

impl fmt::Display for TimeFlexibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeFlexibility::Strict => "strict",
            TimeFlexibility::Moderate => "moderate",
            TimeFlexibility::Flexible => "flexible",
        })
    }
}

fn default_difficulty() -> f64 {
    0.5
}

fn default_step_count() -> usize {
    3
}

/// A teacher's lesson request. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRequest {
    pub grade: String,
    pub curriculum: String,
    pub subject: String,
    pub topic: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: f64,
    #[serde(default = "default_step_count")]
    pub step_count: usize,
    /// Block type wanted for step i, by position. Shorter than the lesson
    /// is fine; later steps keep their category's type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_blocks: Vec<BlockType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_time_minutes: Option<u32>,
    #[serde(default)]
    pub time_flexibility: TimeFlexibility,
}

impl LessonRequest {
    pub fn new(
        grade: impl Into<String>,
        curriculum: impl Into<String>,
        subject: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            grade: grade.into(),
            curriculum: curriculum.into(),
            subject: subject.into(),
            topic: topic.into(),
            difficulty: default_difficulty(),
            step_count: default_step_count(),
            preferred_blocks: Vec::new(),
            available_time_minutes: None,
            time_flexibility: TimeFlexibility::default(),
        }
    }

    pub fn with_preferred_blocks(mut self, preferred: Vec<BlockType>) -> Self {
        self.preferred_blocks = preferred;
        self
    }

    pub fn with_available_time(mut self, minutes: u32, flexibility: TimeFlexibility) -> Self {
        self.available_time_minutes = Some(minutes);
        self.time_flexibility = flexibility;
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_step_count(mut self, step_count: usize) -> Self {
        self.step_count = step_count;
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let required = [
            ("grade", &self.grade),
            ("curriculum", &self.curriculum),
            ("subject", &self.subject),
            ("topic", &self.topic),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ApiError::InvalidRequest(format!("{} must not be empty", field)));
            }
        }
        if !self.difficulty.is_finite() || !(0.0..=1.0).contains(&self.difficulty) {
            return Err(ApiError::InvalidRequest(format!(
                "difficulty must be between 0.0 and 1.0, got {}",
                self.difficulty
            )));
        }
        if self.step_count < 1 || self.step_count > MAX_STEP_COUNT {
            return Err(ApiError::InvalidRequest(format!(
                "step_count must be between 1 and {}, got {}",
                MAX_STEP_COUNT, self.step_count
            )));
        }
        if self.preferred_blocks.len() > self.step_count {
            return Err(ApiError::InvalidRequest(format!(
                "{} preferred blocks given for {} steps",
                self.preferred_blocks.len(),
                self.step_count
            )));
        }
        if let Some(minutes) = self.available_time_minutes {
            if !AVAILABLE_TIME_RANGE.contains(&minutes) {
                return Err(ApiError::InvalidRequest(format!(
                    "available_time_minutes must be between {} and {}, got {}",
                    AVAILABLE_TIME_RANGE.start(),
                    AVAILABLE_TIME_RANGE.end(),
                    minutes
                )));
            }
            let needed = self.step_count as u32 * MIN_MINUTES_PER_STEP;
            if minutes < needed {
                return Err(ApiError::InvalidRequest(format!(
                    "available time ({} min) is too short for {} steps; at least {} min needed",
                    minutes, self.step_count, needed
                )));
            }
        }
        Ok(())
    }
}

/// Block identifier, derived from the lesson id and step index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn for_step(lesson_id: &str, step_index: usize) -> Self {
        let digest = blake3::hash(format!("{}:{}", lesson_id, step_index).as_bytes());
        BlockId(format!("block-{}", hex::encode(&digest.as_bytes()[..8])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Skill reference carried on each block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRef {
    pub name: String,
    pub color: SkillColor,
    pub icon_url: String,
    pub category: String,
}

impl From<&ThinkingSkill> for SkillRef {
    fn from(skill: &ThinkingSkill) -> Self {
        Self {
            name: skill.name.clone(),
            color: skill.color,
            icon_url: skill.icon_url.clone(),
            category: skill.color.category_name().to_string(),
        }
    }
}

/// One validated lesson activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub title: String,
    pub description: String,
    pub steps: Vec<String>,
    pub skill: SkillRef,
    pub supporting_question: String,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sentence_starters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_words: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonMetadata {
    /// Skill names in selection order, without duplicates.
    pub skills_used: Vec<String>,
    /// One category per block, in block order.
    pub cognitive_progression: Vec<SkillColor>,
    pub estimated_duration: String,
    pub difficulty_level: String,
    /// Blocks that were substituted with the fallback template.
    #[serde(default)]
    pub fallback_blocks: usize,
    /// Present when the request gave an available time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_fit: Option<TimeFit>,
}

/// How the estimated duration compares with the requested time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFit {
    pub available_minutes: u32,
    pub estimated_minutes: u32,
    pub flexibility: TimeFlexibility,
    /// Steps switched to a shorter format to save time.
    #[serde(default)]
    pub shortened_steps: Vec<usize>,
}

impl TimeFit {
    pub fn fits(&self) -> bool {
        self.estimated_minutes <= self.available_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub lesson_id: String,
    pub topic: String,
    pub grade: String,
    pub subject: String,
    pub curriculum: String,
    pub difficulty: f64,
    pub blocks: Vec<Block>,
    pub metadata: LessonMetadata,
    pub generated_at: DateTime<Utc>,
}
