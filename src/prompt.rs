//! Prompt templates and the builder that renders them.

mod builder;
mod templates;

pub use builder::{
    difficulty_text, Complexity, Prompt, PromptBuilder, NO_CONTEXT_PLACEHOLDER, SYSTEM_PROMPT,
};
pub use templates::{BlockTemplate, TemplateSet, REQUIRED_PLACEHOLDERS, REQUIRED_SCHEMA_FIELDS};
