//! In-process collaborators for tests and offline runs: a scripted
//! generation backend and fixed vector stores. None of them touch the network.

use crate::error::ApiError;
use crate::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, MessageRole, ModelProviderClient,
    TokenUsage,
};
use crate::retrieval::{SearchFilter, VectorMatch, VectorStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Skill named in a rendered prompt (`thinking skill 'Name'`), if any.
pub fn skill_in_prompt(messages: &[ChatMessage]) -> Option<String> {
    const MARKER: &str = "thinking skill '";
    messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .find_map(|m| {
            let start = m.content.find(MARKER)? + MARKER.len();
            let end = m.content[start..].find('\'')?;
            Some(m.content[start..start + end].to_string())
        })
}

/// A well-formed block response for `skill`, carrying every optional list.
pub fn valid_block_json(skill: &str) -> String {
    serde_json::json!({
        "title": format!("{} Challenge", skill),
        "description": format!("Students practise {} with the lesson topic.", skill.to_lowercase()),
        "steps": [
            "Read the prompt together",
            format!("Apply {} to the examples", skill.to_lowercase()),
            "Share one finding with the class"
        ],
        "supporting_question": format!("How did {} help you?", skill.to_lowercase()),
        "sentence_starters": ["I noticed...", "This shows..."],
        "materials": ["paper", "markers"]
    })
    .to_string()
}

#[derive(Debug, Clone)]
enum Script {
    Valid,
    Invalid,
    Reply(String),
    Fail(String),
}

/// Generation backend that answers from a script keyed by skill name.
///
/// By default every skill gets [`valid_block_json`]. Per-skill delays run on
/// the tokio clock, so paused-time tests stay instant.
pub struct ScriptedProvider {
    default: Script,
    per_skill: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            default: Script::Valid,
            per_skill: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every response is prose with no JSON object.
    pub fn always_invalid() -> Self {
        Self {
            default: Script::Invalid,
            ..Self::default()
        }
    }

    /// Every call fails with a backend error.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self {
            default: Script::Fail(message.into()),
            ..Self::default()
        }
    }

    pub fn with_reply(mut self, skill: &str, raw: impl Into<String>) -> Self {
        self.per_skill
            .insert(skill.to_string(), Script::Reply(raw.into()));
        self
    }

    pub fn with_invalid(mut self, skill: &str) -> Self {
        self.per_skill.insert(skill.to_string(), Script::Invalid);
        self
    }

    pub fn with_delay(mut self, skill: &str, delay: Duration) -> Self {
        self.delays.insert(skill.to_string(), delay);
        self
    }

    /// Every delay set to `delay`, for skills named later too.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.delays.insert(String::new(), delay);
        self
    }

    /// Skill names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// User prompts in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Most `complete` calls ever running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn delay_for(&self, skill: &str) -> Option<Duration> {
        self.delays
            .get(skill)
            .or_else(|| self.delays.get(""))
            .copied()
    }
}

#[async_trait]
impl ModelProviderClient for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let skill = skill_in_prompt(&messages).unwrap_or_default();
        self.calls.lock().push(skill.clone());
        if let Some(user) = messages.iter().find(|m| m.role == MessageRole::User) {
            self.prompts.lock().push(user.content.clone());
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay_for(&skill) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let content = match self.per_skill.get(&skill).unwrap_or(&self.default) {
            Script::Valid => valid_block_json(&skill),
            Script::Invalid => "Here is a lovely activity, but no JSON today.".to_string(),
            Script::Reply(raw) => raw.clone(),
            Script::Fail(message) => return Err(ApiError::ProviderError(message.clone())),
        };
        Ok(CompletionResponse {
            content,
            model: "scripted".to_string(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Returns the same matches for every query, best first, cut to `top_k`.
pub struct StaticVectorStore {
    matches: Vec<VectorMatch>,
    searches: Mutex<usize>,
}

impl StaticVectorStore {
    pub fn new(mut matches: Vec<VectorMatch>) -> Self {
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self {
            matches,
            searches: Mutex::new(0),
        }
    }

    /// Matches built from `(text, score)` pairs; ids and sources are numbered.
    pub fn from_texts(texts: &[(&str, f32)]) -> Self {
        Self::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, (text, score))| VectorMatch {
                    id: format!("chunk-{}", i),
                    text: text.to_string(),
                    source: format!("doc-{}", i),
                    score: *score,
                    values: None,
                })
                .collect(),
        )
    }

    pub fn search_count(&self) -> usize {
        *self.searches.lock()
    }
}

#[async_trait]
impl VectorStore for StaticVectorStore {
    async fn search(
        &self,
        _embedding: &[f32],
        _filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        *self.searches.lock() += 1;
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// The first search stalls for `stall`; every search returns nothing.
pub struct StallingVectorStore {
    stall: Duration,
    searches: AtomicUsize,
}

impl StallingVectorStore {
    pub fn new(stall: Duration) -> Self {
        Self {
            stall,
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorStore for StallingVectorStore {
    async fn search(
        &self,
        _embedding: &[f32],
        _filter: &SearchFilter,
        _top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        if self.searches.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.stall).await;
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// A store with nothing in it.
#[derive(Default)]
pub struct EmptyVectorStore;

#[async_trait]
impl VectorStore for EmptyVectorStore {
    async fn search(
        &self,
        _embedding: &[f32],
        _filter: &SearchFilter,
        _top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "empty"
    }
}

/// Every search fails with a retrieval error.
#[derive(Default)]
pub struct FailingVectorStore;

#[async_trait]
impl VectorStore for FailingVectorStore {
    async fn search(
        &self,
        _embedding: &[f32],
        _filter: &SearchFilter,
        _top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        Err(ApiError::Retrieval("index unavailable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
