//! Parsing and validation of raw backend output into a [`Block`].

use crate::lesson::{Block, BlockId, BlockType, SkillRef};
use crate::skills::ThinkingSkill;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// Why a backend response could not become a block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockRejection {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response is not valid block JSON: {0}")]
    MalformedJson(String),

    #[error("required field '{0}' is missing or blank")]
    MissingField(&'static str),

    #[error("steps must contain at least one instruction")]
    EmptySteps,

    #[error("step {0} is blank")]
    BlankStep(usize),

    #[error("media reference '{0}' is not an absolute http(s) URL")]
    InvalidMedia(String),
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    title: Option<String>,
    description: Option<String>,
    steps: Option<Vec<String>>,
    supporting_question: Option<String>,
    #[serde(default)]
    media: Vec<String>,
    #[serde(default)]
    sentence_starters: Vec<String>,
    #[serde(default)]
    materials: Vec<String>,
    #[serde(default)]
    target_words: Vec<String>,
    #[serde(default)]
    criteria: Vec<String>,
}

/// The outermost `{ ... }` span, so prose or code fences around it are ignored.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn required(value: Option<String>, field: &'static str) -> Result<String, BlockRejection> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(BlockRejection::MissingField(field))
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn is_http_reference(reference: &str) -> bool {
    Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

/// `{base}/{suggestion}` when both are present.
pub fn suggested_media(media_base_url: Option<&str>, skill: &ThinkingSkill) -> Option<String> {
    let base = media_base_url?.trim_end_matches('/');
    let suggestion = skill.media_suggestion.as_deref()?.trim_start_matches('/');
    if base.is_empty() || suggestion.is_empty() {
        return None;
    }
    Some(format!("{}/{}", base, suggestion))
}

/// Validate `raw` and build the block. Never returns a partially valid block.
pub fn parse_block(
    raw: &str,
    id: BlockId,
    block_type: BlockType,
    skill: &ThinkingSkill,
    media_base_url: Option<&str>,
) -> Result<Block, BlockRejection> {
    let json = extract_json_object(raw).ok_or(BlockRejection::NoJsonObject)?;
    let parsed: RawBlock =
        serde_json::from_str(json).map_err(|e| BlockRejection::MalformedJson(e.to_string()))?;

    let title = required(parsed.title, "title")?;
    let description = required(parsed.description, "description")?;
    let supporting_question = required(parsed.supporting_question, "supporting_question")?;

    let raw_steps = parsed.steps.ok_or(BlockRejection::MissingField("steps"))?;
    if raw_steps.is_empty() {
        return Err(BlockRejection::EmptySteps);
    }
    let mut steps = Vec::with_capacity(raw_steps.len());
    for (index, step) in raw_steps.into_iter().enumerate() {
        let step = step.trim();
        if step.is_empty() {
            return Err(BlockRejection::BlankStep(index + 1));
        }
        steps.push(step.to_string());
    }

    let mut media = Vec::with_capacity(parsed.media.len() + 1);
    for reference in parsed.media {
        let reference = reference.trim();
        if !is_http_reference(reference) {
            return Err(BlockRejection::InvalidMedia(reference.to_string()));
        }
        media.push(reference.to_string());
    }
    if let Some(suggested) = suggested_media(media_base_url, skill) {
        if is_http_reference(&suggested) && !media.contains(&suggested) {
            media.push(suggested);
        }
    }

    Ok(Block {
        id,
        block_type,
        title,
        description,
        steps,
        skill: SkillRef::from(skill),
        supporting_question,
        media,
        sentence_starters: non_blank(parsed.sentence_starters),
        materials: non_blank(parsed.materials),
        target_words: non_blank(parsed.target_words),
        criteria: non_blank(parsed.criteria),
    })
}
