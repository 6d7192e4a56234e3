//! Skill selection: difficulty and step count to an ordered skill sequence.

use crate::error::ApiError;
use crate::lesson::{BlockType, LessonRequest, TimeFit, TimeFlexibility};
use crate::skills::{DifficultyPolicy, SkillCatalog, SkillColor, ThinkingSkill};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one selection, with the bucket it was derived from so the
/// lesson's difficulty label stays consistent with the chosen skills.
#[derive(Debug, Clone)]
pub struct SkillSelection {
    pub bucket: SkillColor,
    pub difficulty_level: &'static str,
    pub skills: Vec<ThinkingSkill>,
    /// Block type per step, parallel to `skills`.
    pub block_types: Vec<BlockType>,
    /// Skill names picked more than once because their category ran out.
    pub repeated: Vec<String>,
    /// Steps whose preferred block type their category does not allow.
    pub ignored_preferences: Vec<usize>,
    pub time_fit: Option<TimeFit>,
}

impl SkillSelection {
    pub fn progression(&self) -> Vec<SkillColor> {
        self.skills.iter().map(|skill| skill.color).collect()
    }

    pub fn estimated_minutes(&self) -> u32 {
        self.block_types
            .iter()
            .map(|block_type| block_type.profile().average_minutes)
            .sum()
    }
}

pub struct SkillSelector {
    catalog: Arc<SkillCatalog>,
    policy: DifficultyPolicy,
}

impl SkillSelector {
    pub fn new(catalog: Arc<SkillCatalog>, policy: DifficultyPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> &DifficultyPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    /// Ordered skills, one per step.
    pub fn select(&self, difficulty: f64, step_count: usize) -> Result<Vec<ThinkingSkill>, ApiError> {
        Ok(self.plan(difficulty, step_count)?.skills)
    }

    pub fn difficulty_level(&self, difficulty: f64) -> &'static str {
        self.policy.label(difficulty)
    }

    pub fn plan(&self, difficulty: f64, step_count: usize) -> Result<SkillSelection, ApiError> {
        validate_inputs(difficulty, step_count)?;

        let progression = self.policy.progression(difficulty, step_count);
        let mut uses: HashMap<&str, usize> = HashMap::new();
        let mut skills = Vec::with_capacity(step_count);
        let mut repeated = Vec::new();

        for color in progression {
            let candidates = self.catalog.skills_in_category(color);
            let unused = candidates
                .iter()
                .find(|skill| !uses.contains_key(skill.name.as_str()));

            let chosen = match unused {
                Some(skill) => skill,
                None => {
                    // min_by_key keeps the first minimum, i.e. the highest-priority one.
                    let skill = candidates
                        .iter()
                        .min_by_key(|skill| uses.get(skill.name.as_str()).copied().unwrap_or(0))
                        .ok_or_else(|| {
                            ApiError::Configuration(format!("No skills in category {}", color))
                        })?;
                    warn!(
                        category = %color,
                        skill = %skill.name,
                        "Category exhausted; repeating skill"
                    );
                    if !repeated.contains(&skill.name) {
                        repeated.push(skill.name.clone());
                    }
                    skill
                }
            };

            *uses.entry(chosen.name.as_str()).or_insert(0) += 1;
            skills.push(chosen.clone());
        }

        let bucket = self.policy.bucket(difficulty);
        let selection = SkillSelection {
            bucket,
            difficulty_level: self.policy.label(difficulty),
            block_types: skills.iter().map(|skill| skill.block_type()).collect(),
            skills,
            repeated,
            ignored_preferences: Vec::new(),
            time_fit: None,
        };

        debug!(
            difficulty,
            step_count,
            bucket = %bucket,
            skills = ?selection.skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "Selected skill progression"
        );

        Ok(selection)
    }
}

impl SkillSelector {
    /// Full selection for a request: skills, then the block type per step
    /// from `preferred_blocks`, then time fitting against
    /// `available_time_minutes`.
    pub fn plan_request(&self, request: &LessonRequest) -> Result<SkillSelection, ApiError> {
        request.validate()?;
        let mut selection = self.plan(request.difficulty, request.step_count)?;
        apply_preferences(&mut selection, &request.preferred_blocks);
        if let Some(available) = request.available_time_minutes {
            fit_to_time(&mut selection, request, available);
        }
        Ok(selection)
    }
}

fn apply_preferences(selection: &mut SkillSelection, preferred: &[BlockType]) {
    for (index, block_type) in preferred.iter().copied().enumerate() {
        let Some(skill) = selection.skills.get(index) else {
            break;
        };
        if skill.color.allows_block_type(block_type) {
            selection.block_types[index] = block_type;
        } else {
            debug!(
                step = index,
                skill = %skill.name,
                preferred = %block_type,
                kept = %selection.block_types[index],
                "Preferred block type not allowed for category"
            );
            selection.ignored_preferences.push(index);
        }
    }
}

/// Switch steps to the shortest allowed format. Strict switches every step
/// it can; moderate stops once the estimate fits; flexible only reports.
/// Steps with an honored preference are left alone.
fn fit_to_time(selection: &mut SkillSelection, request: &LessonRequest, available: u32) {
    let flexibility = request.time_flexibility;
    let shortest = BlockType::ALL
        .into_iter()
        .min_by_key(|block_type| block_type.profile().average_minutes)
        .unwrap_or(BlockType::SayIt);

    let mut candidates: Vec<usize> = (0..selection.skills.len())
        .filter(|&index| {
            let preferred = index < request.preferred_blocks.len()
                && !selection.ignored_preferences.contains(&index);
            !preferred
                && selection.block_types[index] != shortest
                && selection.skills[index].color.allows_block_type(shortest)
        })
        .collect();
    // Longest formats first so the fewest steps change.
    candidates.sort_by_key(|&index| {
        std::cmp::Reverse(selection.block_types[index].profile().average_minutes)
    });

    let mut shortened = Vec::new();
    for index in candidates {
        let overrun = selection.estimated_minutes() > available;
        let switch = match flexibility {
            TimeFlexibility::Strict => true,
            TimeFlexibility::Moderate => overrun,
            TimeFlexibility::Flexible => false,
        };
        if !switch {
            break;
        }
        selection.block_types[index] = shortest;
        shortened.push(index);
    }
    shortened.sort_unstable();

    let fit = TimeFit {
        available_minutes: available,
        estimated_minutes: selection.estimated_minutes(),
        flexibility,
        shortened_steps: shortened,
    };
    if !fit.fits() {
        warn!(
            available = fit.available_minutes,
            estimated = fit.estimated_minutes,
            flexibility = %flexibility,
            "Lesson estimate exceeds the available time"
        );
    }
    selection.time_fit = Some(fit);
}

fn validate_inputs(difficulty: f64, step_count: usize) -> Result<(), ApiError> {
    if !difficulty.is_finite() || !(0.0..=1.0).contains(&difficulty) {
        return Err(ApiError::InvalidRequest(format!(
            "difficulty must be between 0.0 and 1.0, got {}",
            difficulty
        )));
    }
    if step_count < 1 {
        return Err(ApiError::InvalidRequest(
            "step_count must be at least 1".to_string(),
        ));
    }
    Ok(())
}
