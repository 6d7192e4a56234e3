//! thinkblocks: skill-progressive lesson planning
//!
//! A lesson request (grade, curriculum, subject, topic, difficulty, step
//! count) becomes a sequence of activity blocks. Each block exercises one
//! thinking skill, skills climb in cognitive complexity across the lesson,
//! and every block is generated from retrieved curriculum context.
//!
//! Pipeline: [`skills::SkillSelector`] picks the skills,
//! [`retrieval::ContextRetriever`] fetches context per step,
//! [`prompt::PromptBuilder`] renders the block prompt,
//! [`generation::BlockGenerator`] calls the backend with retry and fallback,
//! and [`lesson::LessonAssembler`] runs the steps concurrently under one
//! deadline. [`api::PlannerApi`] is the entry point.

pub mod api;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod generation;
pub mod lesson;
pub mod logging;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod retry;
pub mod skills;
pub mod store;
pub mod testing;

pub use api::PlannerApi;
pub use error::ApiError;
pub use lesson::{Block, LessonPlan, LessonRequest};
