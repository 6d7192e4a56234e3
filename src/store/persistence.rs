//! Sled-backed lesson store. Values are the plan's JSON encoding.

use crate::error::StorageError;
use crate::lesson::LessonPlan;
use crate::store::{sort_summaries, LessonStore, LessonSummary};
use std::path::Path;

pub struct SledLessonStore {
    db: sled::Db,
}

impl SledLessonStore {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StorageError::Backend(format!(
                "Failed to open sled database at {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(format!("Failed to flush lesson store: {}", e)))?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<LessonPlan, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Decode(e.to_string()))
    }
}

impl LessonStore for SledLessonStore {
    fn save(&self, plan: &LessonPlan) -> Result<(), StorageError> {
        let value = serde_json::to_vec(plan).map_err(|e| StorageError::Encode {
            lesson_id: plan.lesson_id.clone(),
            message: e.to_string(),
        })?;
        self.db
            .insert(plan.lesson_id.as_bytes(), value)
            .map_err(|e| StorageError::Backend(format!("Failed to store lesson: {}", e)))?;
        self.flush()
    }

    fn get(&self, lesson_id: &str) -> Result<Option<LessonPlan>, StorageError> {
        match self
            .db
            .get(lesson_id.as_bytes())
            .map_err(|e| StorageError::Backend(format!("Failed to read lesson: {}", e)))?
        {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<LessonSummary>, StorageError> {
        let mut summaries = Vec::new();
        for entry in self.db.iter() {
            let (_, value) =
                entry.map_err(|e| StorageError::Backend(format!("Failed to scan lessons: {}", e)))?;
            summaries.push(LessonSummary::from(&Self::decode(&value)?));
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }
}
