//! Lesson data model, block-type profiles, metadata and assembly.

mod assembler;
mod block_type;
mod metadata;
mod model;

pub use assembler::{
    AssemblerConfig, AssemblyLog, AssemblyReport, AssemblyState, LessonAssembler,
};
pub use block_type::{BlockType, BlockTypeProfile, ExtraField};
pub use metadata::{build_metadata, estimated_duration};
pub use model::{
    Block, BlockId, LessonMetadata, LessonPlan, LessonRequest, SkillRef, TimeFit,
    TimeFlexibility, AVAILABLE_TIME_RANGE, MAX_STEP_COUNT, MIN_MINUTES_PER_STEP,
};
