//! Lesson Store
//!
//! Keeps finished lesson plans for retrieval by id. Called by the inbound
//! API after assembly; the pipeline itself never writes here.

pub mod persistence;

pub use persistence::SledLessonStore;

use crate::error::StorageError;
use crate::lesson::LessonPlan;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Listing entry for a stored lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub lesson_id: String,
    pub topic: String,
    pub grade: String,
    pub subject: String,
    pub block_count: usize,
    pub difficulty_level: String,
    pub generated_at: DateTime<Utc>,
}

impl From<&LessonPlan> for LessonSummary {
    fn from(plan: &LessonPlan) -> Self {
        Self {
            lesson_id: plan.lesson_id.clone(),
            topic: plan.topic.clone(),
            grade: plan.grade.clone(),
            subject: plan.subject.clone(),
            block_count: plan.blocks.len(),
            difficulty_level: plan.metadata.difficulty_level.clone(),
            generated_at: plan.generated_at,
        }
    }
}

/// Newest first, ties by id.
pub(crate) fn sort_summaries(summaries: &mut [LessonSummary]) {
    summaries.sort_by(|a, b| {
        b.generated_at
            .cmp(&a.generated_at)
            .then_with(|| a.lesson_id.cmp(&b.lesson_id))
    });
}

pub trait LessonStore: Send + Sync {
    /// Insert or replace the plan under its lesson id.
    fn save(&self, plan: &LessonPlan) -> Result<(), StorageError>;

    fn get(&self, lesson_id: &str) -> Result<Option<LessonPlan>, StorageError>;

    fn list(&self) -> Result<Vec<LessonSummary>, StorageError>;
}

#[derive(Default)]
pub struct InMemoryLessonStore {
    plans: RwLock<HashMap<String, LessonPlan>>,
}

impl InMemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LessonStore for InMemoryLessonStore {
    fn save(&self, plan: &LessonPlan) -> Result<(), StorageError> {
        self.plans
            .write()
            .insert(plan.lesson_id.clone(), plan.clone());
        Ok(())
    }

    fn get(&self, lesson_id: &str) -> Result<Option<LessonPlan>, StorageError> {
        Ok(self.plans.read().get(lesson_id).cloned())
    }

    fn list(&self) -> Result<Vec<LessonSummary>, StorageError> {
        let mut summaries: Vec<LessonSummary> =
            self.plans.read().values().map(LessonSummary::from).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }
}
