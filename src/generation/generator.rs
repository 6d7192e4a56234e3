//! Block generation with bounded retry and deterministic fallback.

use crate::concurrency::Deadline;
use crate::generation::fallback::fallback_block;
use crate::generation::parse::{parse_block, BlockRejection};
use crate::lesson::{Block, BlockId};
use crate::prompt::Prompt;
use crate::provider::{CompletionOptions, ModelProviderClient};
use crate::retry::RetryPolicy;
use crate::skills::ThinkingSkill;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why one generation attempt produced no block.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("backend call failed: {message}")]
    Backend { message: String, retryable: bool },

    #[error("response rejected: {0}")]
    Rejected(BlockRejection),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl FailureReason {
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureReason::Backend { retryable, .. } => *retryable,
            FailureReason::Rejected(_) => true,
            FailureReason::DeadlineExceeded => false,
        }
    }
}

/// Either a validated block or the fallback plus the reason it was needed.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Generated {
        block: Block,
        attempts: u32,
    },
    Fallback {
        block: Block,
        reason: FailureReason,
        attempts: u32,
    },
}

impl BlockOutcome {
    pub fn block(&self) -> &Block {
        match self {
            BlockOutcome::Generated { block, .. } | BlockOutcome::Fallback { block, .. } => block,
        }
    }

    pub fn into_block(self) -> Block {
        match self {
            BlockOutcome::Generated { block, .. } | BlockOutcome::Fallback { block, .. } => block,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            BlockOutcome::Generated { attempts, .. } | BlockOutcome::Fallback { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BlockOutcome::Fallback { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorSettings {
    pub retry: RetryPolicy,
    /// Base URL for skill media suggestions; none disables them.
    pub media_base_url: Option<String>,
    /// Provider-level defaults for options the prompt leaves unset.
    pub default_options: CompletionOptions,
}

pub struct BlockGenerator {
    provider: Arc<dyn ModelProviderClient>,
    settings: GeneratorSettings,
}

impl BlockGenerator {
    pub fn new(provider: Arc<dyn ModelProviderClient>, settings: GeneratorSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub async fn generate(&self, id: BlockId, prompt: &Prompt, skill: &ThinkingSkill) -> BlockOutcome {
        self.generate_within(id, prompt, skill, &Deadline::none())
            .await
    }

    /// Attempts until one validates, the policy gives up, or the deadline
    /// passes; the last two end in the fallback block.
    pub async fn generate_within(
        &self,
        id: BlockId,
        prompt: &Prompt,
        skill: &ThinkingSkill,
        deadline: &Deadline,
    ) -> BlockOutcome {
        let policy = &self.settings.retry;
        let mut attempt: u32 = 0;

        let reason = loop {
            attempt += 1;
            let started = Instant::now();
            let result = match deadline.run(self.attempt(&id, prompt, skill)).await {
                Ok(result) => result,
                Err(_) => break FailureReason::DeadlineExceeded,
            };

            match result {
                Ok(block) => {
                    info!(
                        block_id = %id,
                        skill = %skill.name,
                        block_type = %prompt.block_type,
                        attempt,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Generated block"
                    );
                    return BlockOutcome::Generated {
                        block,
                        attempts: attempt,
                    };
                }
                Err(reason) => {
                    let retry = reason.is_retryable() && policy.should_retry(attempt);
                    warn!(
                        block_id = %id,
                        skill = %skill.name,
                        block_type = %prompt.block_type,
                        attempt,
                        reason = %reason,
                        will_retry = retry,
                        "Block generation attempt failed"
                    );
                    if !retry {
                        break reason;
                    }
                    let delay = policy.delay_after(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
                    if deadline.sleep(delay).await.is_err() {
                        break FailureReason::DeadlineExceeded;
                    }
                }
            }
        };

        warn!(
            block_id = %id,
            skill = %skill.name,
            block_type = %prompt.block_type,
            attempts = attempt,
            reason = %reason,
            "Substituting fallback block"
        );
        BlockOutcome::Fallback {
            block: fallback_block(id, skill, prompt.block_type),
            reason,
            attempts: attempt,
        }
    }

    async fn attempt(
        &self,
        id: &BlockId,
        prompt: &Prompt,
        skill: &ThinkingSkill,
    ) -> Result<Block, FailureReason> {
        let options = prompt
            .completion_options()
            .or(&self.settings.default_options);
        let response = self
            .provider
            .complete(prompt.messages(), options)
            .await
            .map_err(|e| FailureReason::Backend {
                retryable: e.is_retryable(),
                message: e.to_string(),
            })?;

        debug!(
            block_id = %id,
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Backend responded"
        );

        parse_block(
            &response.content,
            id.clone(),
            prompt.block_type,
            skill,
            self.settings.media_base_url.as_deref(),
        )
        .map_err(FailureReason::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::lesson::{BlockType, LessonRequest};
    use crate::prompt::{PromptBuilder, TemplateSet};
    use crate::provider::{ChatMessage, CompletionResponse, TokenUsage};
    use crate::skills::SkillCatalog;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        AuthFailure,
    }

    /// Replays queued replies, then repeats the last one.
    struct QueuedProvider {
        queue: Mutex<VecDeque<Reply>>,
        calls: Mutex<u32>,
    }

    impl QueuedProvider {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                queue: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl ModelProviderClient for QueuedProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _options: CompletionOptions,
        ) -> Result<CompletionResponse, ApiError> {
            *self.calls.lock() += 1;
            let reply = {
                let mut queue = self.queue.lock();
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            };
            match reply {
                Some(Reply::Text(content)) => Ok(CompletionResponse {
                    content: content.to_string(),
                    model: "queued".to_string(),
                    usage: TokenUsage::default(),
                    finish_reason: Some("stop".to_string()),
                }),
                Some(Reply::AuthFailure) => {
                    Err(ApiError::ProviderAuthFailed("bad key".to_string()))
                }
                None => Err(ApiError::ProviderError("queue empty".to_string())),
            }
        }

        fn provider_name(&self) -> &str {
            "queued"
        }

        fn model_name(&self) -> &str {
            "queued"
        }
    }

    const VALID: &str = r#"{"title": "Seed Sort", "description": "Group seeds.",
        "steps": ["Sort"], "supporting_question": "Why?"}"#;

    fn fast_retry() -> GeneratorSettings {
        GeneratorSettings {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 10,
                max_backoff_ms: 40,
                multiplier: 2.0,
            },
            ..GeneratorSettings::default()
        }
    }

    fn prompt_for(skill: &ThinkingSkill) -> Prompt {
        let builder = PromptBuilder::new(Arc::new(TemplateSet::builtin().unwrap()), 500);
        let request = LessonRequest::new("Year 4", "UK KS2", "Science", "Seeds");
        builder.build_for(skill, skill.block_type(), &[], &request)
    }

    fn skill() -> ThinkingSkill {
        SkillCatalog::builtin()
            .unwrap()
            .skill("Categorise")
            .unwrap()
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_invalid_output() {
        let provider = Arc::new(QueuedProvider::new(vec![
            Reply::Text("not json"),
            Reply::Text(VALID),
        ]));
        let generator = BlockGenerator::new(provider.clone(), fast_retry());
        let skill = skill();

        let outcome = generator
            .generate(BlockId::for_step("l", 0), &prompt_for(&skill), &skill)
            .await;
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.block().title, "Seed Sort");
        assert_eq!(outcome.block().block_type, BlockType::MapIt);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_after_three_invalid_responses() {
        let provider = Arc::new(QueuedProvider::new(vec![Reply::Text(r#"{"title": "x"}"#)]));
        let generator = BlockGenerator::new(provider.clone(), fast_retry());
        let skill = skill();
        let id = BlockId::for_step("l", 1);

        let outcome = generator.generate(id.clone(), &prompt_for(&skill), &skill).await;
        match &outcome {
            BlockOutcome::Fallback {
                reason, attempts, ..
            } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(reason, FailureReason::Rejected(_)));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
        assert_eq!(
            outcome.into_block(),
            fallback_block(id, &skill, BlockType::MapIt)
        );
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_is_not_retried() {
        let provider = Arc::new(QueuedProvider::new(vec![Reply::AuthFailure]));
        let generator = BlockGenerator::new(provider.clone(), fast_retry());
        let skill = skill();

        let outcome = generator
            .generate(BlockId::for_step("l", 0), &prompt_for(&skill), &skill)
            .await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_yields_fallback() {
        let provider = Arc::new(QueuedProvider::new(vec![Reply::Text("garbage")]));
        let generator = BlockGenerator::new(
            provider,
            GeneratorSettings {
                retry: RetryPolicy {
                    max_attempts: 3,
                    initial_backoff_ms: 1_000,
                    max_backoff_ms: 1_000,
                    multiplier: 1.0,
                },
                ..GeneratorSettings::default()
            },
        );
        let skill = skill();
        let deadline = Deadline::after(Duration::from_millis(500));

        let outcome = generator
            .generate_within(BlockId::for_step("l", 0), &prompt_for(&skill), &skill, &deadline)
            .await;
        match outcome {
            BlockOutcome::Fallback { reason, attempts, .. } => {
                assert_eq!(reason, FailureReason::DeadlineExceeded);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }
}
