//! Block generation: backend call, validation, retry and fallback.

mod fallback;
mod generator;
mod parse;

pub use fallback::fallback_block;
pub use generator::{BlockGenerator, BlockOutcome, FailureReason, GeneratorSettings};
pub use parse::{extract_json_object, parse_block, suggested_media, BlockRejection};
