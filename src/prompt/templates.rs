//! Per-block-type prompt templates.
//!
//! A template is a body with `{placeholder}` slots plus a JSON example of the
//! expected response. Both are checked once at load: a template that cannot
//! ask for `steps` or `supporting_question` is rejected as a configuration
//! error before any request is served.

use crate::error::ApiError;
use crate::lesson::BlockType;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Placeholders every template body must use.
pub const REQUIRED_PLACEHOLDERS: [&str; 4] =
    ["{topic}", "{grade}", "{skill_name}", "{curriculum_context}"];

/// Keys every response schema must ask for.
pub const REQUIRED_SCHEMA_FIELDS: [&str; 4] =
    ["title", "description", "steps", "supporting_question"];

const MAP_IT_BODY: &str = "\
Create a MapIt activity for {grade} students learning about {topic} in {subject}.

Use the thinking skill '{skill_name}' ({skill_color}): {skill_description}
A question that captures this skill: {example_question}

Curriculum context:
{curriculum_context}

The activity should be {activity_focus}, using a graphic organizer that suits {skill_name}.
Pitch it at a {difficulty_text} level, aligned with {curriculum} standards.
Include 3-4 clear, actionable steps.";

const SAY_IT_BODY: &str = "\
Create a SayIt activity for {grade} students learning about {topic} in {subject}.

Use the thinking skill '{skill_name}' ({skill_color}): {skill_description}
A question that captures this skill: {example_question}

Curriculum context:
{curriculum_context}

The activity should be built around {activity_focus}.
Pitch it at a {difficulty_text} level, aligned with {curriculum} standards.
Include 3-4 steps that guide the discussion and 3-4 sentence starters.";

const BUILD_IT_BODY: &str = "\
Create a BuildIt activity for {grade} students learning about {topic} in {subject}.

Use the thinking skill '{skill_name}' ({skill_color}): {skill_description}
A question that captures this skill: {example_question}

Curriculum context:
{curriculum_context}

The activity should be {activity_focus}.
Pitch it at a {difficulty_text} level, aligned with {curriculum} standards.
Include 4-5 practical steps and a short list of safe, accessible materials.";

const BASE_SCHEMA: &str = r#"{
  "title": "Clear, engaging activity title",
  "description": "2-3 sentences explaining the activity",
  "steps": ["Step 1...", "Step 2...", "Step 3..."],
  "supporting_question": "A question to guide student thinking"
}"#;

const SAY_IT_SCHEMA: &str = r#"{
  "title": "Clear, engaging activity title",
  "description": "2-3 sentences explaining the activity",
  "steps": ["Step 1...", "Step 2...", "Step 3..."],
  "supporting_question": "An open-ended question that prompts discussion",
  "sentence_starters": ["I think...", "In my opinion...", "The evidence shows..."]
}"#;

const BUILD_IT_SCHEMA: &str = r#"{
  "title": "Clear, engaging activity title",
  "description": "2-3 sentences explaining what students will build",
  "steps": ["Step 1...", "Step 2...", "Step 3...", "Step 4..."],
  "supporting_question": "A question that encourages creative thinking",
  "materials": ["Simple material 1", "Simple material 2"]
}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockTemplate {
    pub block_type: BlockType,
    pub body: String,
    /// JSON example of the response object.
    pub schema: String,
}

impl BlockTemplate {
    pub fn new(block_type: BlockType, body: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            block_type,
            body: body.into(),
            schema: schema.into(),
        }
    }

    fn builtin(block_type: BlockType) -> Self {
        match block_type {
            BlockType::MapIt => Self::new(block_type, MAP_IT_BODY, BASE_SCHEMA),
            BlockType::SayIt => Self::new(block_type, SAY_IT_BODY, SAY_IT_SCHEMA),
            BlockType::BuildIt => Self::new(block_type, BUILD_IT_BODY, BUILD_IT_SCHEMA),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !self.body.contains(placeholder) {
                return Err(ApiError::Configuration(format!(
                    "{} template is missing placeholder {}",
                    self.block_type, placeholder
                )));
            }
        }

        let schema: serde_json::Value = serde_json::from_str(&self.schema).map_err(|e| {
            ApiError::Configuration(format!(
                "{} template schema is not valid JSON: {}",
                self.block_type, e
            ))
        })?;
        let object = schema.as_object().ok_or_else(|| {
            ApiError::Configuration(format!(
                "{} template schema must be a JSON object",
                self.block_type
            ))
        })?;

        let extra = self
            .block_type
            .profile()
            .extra_field
            .map(|field| field.key());
        for field in REQUIRED_SCHEMA_FIELDS.into_iter().chain(extra) {
            if !object.contains_key(field) {
                return Err(ApiError::Configuration(format!(
                    "{} template schema does not ask for '{}'",
                    self.block_type, field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TemplateOverride {
    body: Option<String>,
    schema: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateFile {
    #[serde(rename = "MapIt")]
    map_it: Option<TemplateOverride>,
    #[serde(rename = "SayIt")]
    say_it: Option<TemplateOverride>,
    #[serde(rename = "BuildIt")]
    build_it: Option<TemplateOverride>,
}

/// One validated template per block type, looked up by type.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: [BlockTemplate; 3],
}

impl TemplateSet {
    pub fn builtin() -> Result<Self, ApiError> {
        Self::from_templates(BlockType::ALL.map(BlockTemplate::builtin))
    }

    /// Each template must sit at its block type's position.
    pub fn from_templates(templates: [BlockTemplate; 3]) -> Result<Self, ApiError> {
        for (block_type, template) in BlockType::ALL.iter().zip(templates.iter()) {
            if template.block_type != *block_type {
                return Err(ApiError::Configuration(format!(
                    "Template for {} registered in the {} slot",
                    template.block_type, block_type
                )));
            }
            template.validate()?;
        }
        Ok(Self { templates })
    }

    /// Built-in templates with per-type overrides from a TOML document of
    /// `[MapIt]`, `[SayIt]`, `[BuildIt]` tables holding `body` and `schema`.
    pub fn from_toml_str(content: &str) -> Result<Self, ApiError> {
        let file: TemplateFile = toml::from_str(content)
            .map_err(|e| ApiError::Configuration(format!("Invalid templates file: {}", e)))?;
        let overrides = [file.map_it, file.say_it, file.build_it];

        let mut templates = BlockType::ALL.map(BlockTemplate::builtin);
        for (template, override_) in templates.iter_mut().zip(overrides) {
            if let Some(override_) = override_ {
                if let Some(body) = override_.body {
                    template.body = body;
                }
                if let Some(schema) = override_.schema {
                    template.schema = schema;
                }
            }
        }
        Self::from_templates(templates)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ApiError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Configuration(format!(
                "Failed to read templates file {}: {}",
                path.display(),
                e
            ))
        })?;
        let set = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded prompt templates");
        Ok(set)
    }

    pub fn get(&self, block_type: BlockType) -> &BlockTemplate {
        &self.templates[block_type as usize]
    }
}
