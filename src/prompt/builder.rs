//! Prompt composition.
//!
//! [`PromptBuilder::build`] is pure: the same skill, template, context and
//! request always produce the same prompt.

use crate::lesson::{BlockType, LessonRequest};
use crate::prompt::templates::{BlockTemplate, TemplateSet};
use crate::provider::{ChatMessage, CompletionOptions};
use crate::retrieval::ContextChunk;
use crate::skills::{SkillColor, ThinkingSkill};
use std::sync::Arc;

pub const SYSTEM_PROMPT: &str = "You are an expert educator who designs engaging, \
curriculum-aligned classroom activities built around explicit thinking skills. \
Always respond with a single valid JSON object and nothing else.";

pub const NO_CONTEXT_PLACEHOLDER: &str = "No specific curriculum context available.";

const SCHEMA_INSTRUCTION: &str = "IMPORTANT: Return ONLY valid JSON in the following format:";

/// Generation tier, chosen from difficulty and the skill's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Standard,
    Advanced,
}

impl Complexity {
    pub fn for_request(difficulty: f64, color: SkillColor) -> Self {
        if color == SkillColor::Red && difficulty > 0.7 {
            Complexity::Advanced
        } else if difficulty <= 0.3 {
            Complexity::Simple
        } else {
            Complexity::Standard
        }
    }

    pub fn completion_options(self) -> CompletionOptions {
        let (temperature, max_tokens) = match self {
            Complexity::Simple => (0.6, 800),
            Complexity::Standard => (0.7, 1200),
            Complexity::Advanced => (0.7, 1600),
        };
        CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            ..CompletionOptions::default()
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Standard => "standard",
            Complexity::Advanced => "advanced",
        }
    }
}

pub fn difficulty_text(difficulty: f64) -> &'static str {
    if difficulty <= 0.3 {
        "simple and foundational"
    } else if difficulty <= 0.5 {
        "moderate complexity"
    } else if difficulty <= 0.7 {
        "challenging but achievable"
    } else {
        "advanced and complex"
    }
}

/// A fully rendered generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub block_type: BlockType,
    pub skill_name: String,
    pub complexity: Complexity,
    pub context_chunks_used: usize,
    /// True when lower-ranked chunks were cut to fit the budget.
    pub context_truncated: bool,
}

impl Prompt {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }

    pub fn completion_options(&self) -> CompletionOptions {
        self.complexity.completion_options()
    }
}

pub struct PromptBuilder {
    templates: Arc<TemplateSet>,
    context_token_budget: usize,
}

impl PromptBuilder {
    pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 1200;

    pub fn new(templates: Arc<TemplateSet>, context_token_budget: usize) -> Self {
        Self {
            templates,
            context_token_budget,
        }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Build with the registered template for `block_type`.
    pub fn build_for(
        &self,
        skill: &ThinkingSkill,
        block_type: BlockType,
        context: &[ContextChunk],
        request: &LessonRequest,
    ) -> Prompt {
        self.build(skill, self.templates.get(block_type), context, request)
    }

    pub fn build(
        &self,
        skill: &ThinkingSkill,
        template: &BlockTemplate,
        context: &[ContextChunk],
        request: &LessonRequest,
    ) -> Prompt {
        let (curriculum_context, used, truncated) = self.render_context(context);
        let profile = template.block_type.profile();

        let body = fill_placeholders(
            &template.body,
            &[
                ("grade", request.grade.as_str()),
                ("subject", request.subject.as_str()),
                ("topic", request.topic.as_str()),
                ("curriculum", request.curriculum.as_str()),
                ("skill_name", skill.name.as_str()),
                ("skill_description", skill.description.as_str()),
                ("skill_color", skill.color.as_str()),
                ("block_type", template.block_type.as_str()),
                ("example_question", skill.example_question.as_str()),
                ("difficulty_text", difficulty_text(request.difficulty)),
                ("activity_focus", profile.activity_focus),
                ("curriculum_context", curriculum_context.as_str()),
            ],
        );

        let user = format!("{}\n\n{}\n{}", body, SCHEMA_INSTRUCTION, template.schema);

        Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
            block_type: template.block_type,
            skill_name: skill.name.clone(),
            complexity: Complexity::for_request(request.difficulty, skill.color),
            context_chunks_used: used,
            context_truncated: truncated,
        }
    }

    /// Chunks in rank order until the next one would overflow the budget.
    fn render_context(&self, context: &[ContextChunk]) -> (String, usize, bool) {
        let mut spent = 0usize;
        let mut sections = Vec::new();
        for chunk in context {
            let cost = chunk.estimated_tokens();
            if spent + cost > self.context_token_budget {
                break;
            }
            spent += cost;
            sections.push(format!("[{}] {}", chunk.source, chunk.text.trim()));
        }

        let truncated = sections.len() < context.len();
        if sections.is_empty() {
            (NO_CONTEXT_PLACEHOLDER.to_string(), 0, truncated)
        } else {
            let used = sections.len();
            (sections.join("\n\n"), used, truncated)
        }
    }
}

/// Replace each `{name}` in `template` with its value in one left-to-right
/// pass. Substituted text is never scanned again; unknown slots stay as written.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
