//! Block types and their per-type behavior table.
//!
//! Each block type owns a template focus, the extra list field its backend
//! output may carry, an average duration used by the duration heuristic, and
//! the single generic step used by fallback blocks. Lookup goes through
//! [`BlockType::profile`], never through per-type branches scattered across
//! the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockType {
    MapIt,
    SayIt,
    BuildIt,
}

/// Optional list field a block type asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraField {
    SentenceStarters,
    Materials,
}

impl ExtraField {
    pub fn key(self) -> &'static str {
        match self {
            ExtraField::SentenceStarters => "sentence_starters",
            ExtraField::Materials => "materials",
        }
    }
}

/// Static behavior for one block type.
#[derive(Debug, Clone, Copy)]
pub struct BlockTypeProfile {
    pub block_type: BlockType,
    /// Short phrase describing the activity format, used in prompts.
    pub activity_focus: &'static str,
    pub extra_field: Option<ExtraField>,
    pub average_minutes: u32,
    pub fallback_step: &'static str,
}

const PROFILES: [BlockTypeProfile; 3] = [
    BlockTypeProfile {
        block_type: BlockType::MapIt,
        activity_focus: "a graphic organizer that makes the thinking visible",
        extra_field: None,
        average_minutes: 10,
        fallback_step: "Organise what you know about the topic on a thinking map.",
    },
    BlockTypeProfile {
        block_type: BlockType::SayIt,
        activity_focus: "structured talk and discussion",
        extra_field: Some(ExtraField::SentenceStarters),
        average_minutes: 8,
        fallback_step: "Discuss the topic with a partner and share your ideas with the class.",
    },
    BlockTypeProfile {
        block_type: BlockType::BuildIt,
        activity_focus: "a hands-on task where students build or create something",
        extra_field: Some(ExtraField::Materials),
        average_minutes: 15,
        fallback_step: "Build a simple model that shows your understanding of the topic.",
    },
];

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::MapIt, BlockType::SayIt, BlockType::BuildIt];

    pub fn profile(self) -> &'static BlockTypeProfile {
        // PROFILES holds exactly one entry per variant, in declaration order.
        &PROFILES[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::MapIt => "MapIt",
            BlockType::SayIt => "SayIt",
            BlockType::BuildIt => "BuildIt",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MapIt" | "mapit" | "map-it" => Ok(BlockType::MapIt),
            "SayIt" | "sayit" | "say-it" => Ok(BlockType::SayIt),
            "BuildIt" | "buildit" | "build-it" => Ok(BlockType::BuildIt),
            other => Err(format!(
                "Unknown block type: {} (expected MapIt, SayIt or BuildIt)",
                other
            )),
        }
    }
}
