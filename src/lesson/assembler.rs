//! Lesson assembly: selection, per-step retrieval and generation, join.
//!
//! Each step runs retrieval then generation as one task on a bounded pool
//! (`FuturesUnordered` gated by a `Semaphore`), so a slow step never holds up
//! the others. Results are written back by step index, so completion order
//! never reaches the plan. One [`Deadline`] bounds the whole run; steps still
//! pending when it passes are dropped and replaced by fallback blocks.

use crate::concurrency::Deadline;
use crate::error::ApiError;
use crate::generation::{fallback_block, BlockGenerator, BlockOutcome, FailureReason};
use crate::lesson::metadata::build_metadata;
use crate::lesson::{BlockId, BlockType, LessonPlan, LessonRequest};
use crate::prompt::PromptBuilder;
use crate::retrieval::{ContextChunk, ContextRetriever, RetrievalQuery};
use crate::skills::{SkillSelection, SkillSelector, ThinkingSkill};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    SelectingSkills,
    RetrievingContext,
    GeneratingBlocks,
    Assembled,
    Failed,
}

impl AssemblyState {
    pub fn can_transition_to(self, next: AssemblyState) -> bool {
        use AssemblyState::*;
        matches!(
            (self, next),
            (SelectingSkills, RetrievingContext)
                | (RetrievingContext, GeneratingBlocks)
                | (GeneratingBlocks, Assembled)
                | (SelectingSkills | RetrievingContext | GeneratingBlocks, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AssemblyState::Assembled | AssemblyState::Failed)
    }
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssemblyState::SelectingSkills => "selecting_skills",
            AssemblyState::RetrievingContext => "retrieving_context",
            AssemblyState::GeneratingBlocks => "generating_blocks",
            AssemblyState::Assembled => "assembled",
            AssemblyState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// States visited by one lesson, in order.
#[derive(Debug, Clone)]
pub struct AssemblyLog {
    lesson_id: String,
    states: Vec<AssemblyState>,
}

impl AssemblyLog {
    fn new(lesson_id: &str) -> Self {
        debug!(lesson_id, state = %AssemblyState::SelectingSkills, "Lesson state");
        Self {
            lesson_id: lesson_id.to_string(),
            states: vec![AssemblyState::SelectingSkills],
        }
    }

    pub fn current(&self) -> AssemblyState {
        self.states
            .last()
            .copied()
            .unwrap_or(AssemblyState::SelectingSkills)
    }

    pub fn states(&self) -> &[AssemblyState] {
        &self.states
    }

    fn advance(&mut self, next: AssemblyState) -> Result<(), ApiError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(ApiError::Generation(format!(
                "Invalid lesson state transition {} -> {}",
                current, next
            )));
        }
        debug!(lesson_id = %self.lesson_id, from = %current, to = %next, "Lesson state");
        self.states.push(next);
        Ok(())
    }

    /// Move to `GeneratingBlocks` once any step has started generating.
    fn enter_generation(&mut self, generating: &AtomicBool) -> Result<(), ApiError> {
        if self.current() == AssemblyState::RetrievingContext && generating.load(Ordering::Acquire)
        {
            self.advance(AssemblyState::GeneratingBlocks)?;
        }
        Ok(())
    }

    fn fail(&mut self, error: ApiError) -> ApiError {
        if !self.current().is_terminal() {
            self.states.push(AssemblyState::Failed);
        }
        warn!(lesson_id = %self.lesson_id, error = %error, "Lesson assembly failed");
        error
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub max_concurrency: usize,
    /// None disables the overall deadline.
    pub request_timeout: Option<Duration>,
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            request_timeout: Some(Duration::from_secs(90)),
            top_k: 5,
            min_score: 0.2,
        }
    }
}

/// A finished plan plus how it was reached.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub plan: LessonPlan,
    pub log: AssemblyLog,
    /// Generation attempts per step; zero for steps cut off by the deadline.
    pub attempts: Vec<u32>,
    pub timed_out: bool,
}

pub struct LessonAssembler {
    selector: Arc<SkillSelector>,
    retriever: Arc<ContextRetriever>,
    prompts: Arc<PromptBuilder>,
    generator: Arc<BlockGenerator>,
    config: AssemblerConfig,
}

impl LessonAssembler {
    pub fn new(
        selector: Arc<SkillSelector>,
        retriever: Arc<ContextRetriever>,
        prompts: Arc<PromptBuilder>,
        generator: Arc<BlockGenerator>,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            selector,
            retriever,
            prompts,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn selector(&self) -> &SkillSelector {
        &self.selector
    }

    /// Build a plan under a fresh lesson id.
    pub async fn assemble(&self, request: &LessonRequest) -> Result<LessonPlan, ApiError> {
        let lesson_id = uuid::Uuid::new_v4().to_string();
        Ok(self.assemble_report(request, &lesson_id).await?.plan)
    }

    pub async fn assemble_report(
        &self,
        request: &LessonRequest,
        lesson_id: &str,
    ) -> Result<AssemblyReport, ApiError> {
        let started = Instant::now();
        let deadline = self
            .config
            .request_timeout
            .map(Deadline::after)
            .unwrap_or_else(Deadline::none);
        let mut log = AssemblyLog::new(lesson_id);

        let selection = match self.selector.plan_request(request) {
            Ok(selection) => selection,
            Err(err) => return Err(log.fail(err)),
        };
        info!(
            lesson_id,
            topic = %request.topic,
            difficulty = request.difficulty,
            step_count = request.step_count,
            skills = ?selection.skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            progression = ?selection.progression(),
            block_types = ?selection.block_types,
            "Selected skills"
        );

        log.advance(AssemblyState::RetrievingContext)?;
        let outcomes = self
            .run_steps(request, lesson_id, &selection, &deadline, &mut log)
            .await?;

        let total = selection.skills.len();
        let mut blocks = Vec::with_capacity(total);
        let mut attempts = Vec::with_capacity(total);
        let mut fallback_count = 0usize;
        let mut completed = 0usize;

        for (index, (skill, outcome)) in selection.skills.iter().zip(outcomes).enumerate() {
            match outcome {
                Some(outcome) => {
                    let cut_off = matches!(
                        outcome,
                        BlockOutcome::Fallback {
                            reason: FailureReason::DeadlineExceeded,
                            ..
                        }
                    );
                    if !cut_off {
                        completed += 1;
                    }
                    if outcome.is_fallback() {
                        fallback_count += 1;
                    }
                    attempts.push(outcome.attempts());
                    blocks.push(outcome.into_block());
                }
                None => {
                    warn!(lesson_id, step = index, skill = %skill.name, "Step not finished before deadline");
                    fallback_count += 1;
                    attempts.push(0);
                    blocks.push(fallback_block(
                        BlockId::for_step(lesson_id, index),
                        skill,
                        selection.block_types[index],
                    ));
                }
            }
        }

        let timed_out = completed < total;
        if timed_out {
            warn!(
                lesson_id,
                completed,
                total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Lesson deadline exceeded"
            );
        }
        if completed == 0 {
            return Err(log.fail(ApiError::AssemblyTimeout {
                elapsed_ms: started.elapsed().as_millis(),
                completed,
                total,
            }));
        }

        let metadata = build_metadata(&selection, &blocks, fallback_count);
        let plan = LessonPlan {
            lesson_id: lesson_id.to_string(),
            topic: request.topic.clone(),
            grade: request.grade.clone(),
            subject: request.subject.clone(),
            curriculum: request.curriculum.clone(),
            difficulty: request.difficulty,
            blocks,
            metadata,
            generated_at: Utc::now(),
        };
        log.advance(AssemblyState::Assembled)?;

        info!(
            lesson_id,
            blocks = plan.blocks.len(),
            fallback_blocks = fallback_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "Lesson assembled"
        );
        Ok(AssemblyReport {
            plan,
            log,
            attempts,
            timed_out,
        })
    }

    /// Outcome per step, by index; `None` where the deadline cut the step off.
    ///
    /// The lesson moves to `GeneratingBlocks` once the first step has its
    /// context. A retrieval failure leaves that step with empty context.
    async fn run_steps(
        &self,
        request: &LessonRequest,
        lesson_id: &str,
        selection: &SkillSelection,
        deadline: &Deadline,
        log: &mut AssemblyLog,
    ) -> Result<Vec<Option<BlockOutcome>>, ApiError> {
        let skills = &selection.skills;
        let limiter = Semaphore::new(self.config.max_concurrency.max(1));
        let generating = AtomicBool::new(false);
        let mut pending = FuturesUnordered::new();

        for (index, (skill, block_type)) in skills.iter().zip(&selection.block_types).enumerate() {
            let block_type = *block_type;
            let limiter = &limiter;
            let generating = &generating;
            pending.push(async move {
                let _permit = limiter.acquire().await.ok();
                let context = self
                    .retrieve_step(request, index, skill, block_type, deadline)
                    .await;
                generating.store(true, Ordering::Release);

                let prompt = self.prompts.build_for(skill, block_type, &context, request);
                let id = BlockId::for_step(lesson_id, index);
                let outcome = self
                    .generator
                    .generate_within(id, &prompt, skill, deadline)
                    .await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<BlockOutcome>> = vec![None; skills.len()];
        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some((index, outcome)) => outcomes[index] = Some(outcome),
                    None => break,
                },
                _ = deadline.expired() => {
                    warn!(lesson_id, pending = pending.len(), "Deadline reached with steps in flight");
                    break;
                }
            }
            log.enter_generation(&generating)?;
        }
        log.enter_generation(&generating)?;
        Ok(outcomes)
    }

    async fn retrieve_step(
        &self,
        request: &LessonRequest,
        index: usize,
        skill: &ThinkingSkill,
        block_type: BlockType,
        deadline: &Deadline,
    ) -> Vec<ContextChunk> {
        let query = RetrievalQuery::new(
            &request.topic,
            &request.subject,
            &request.grade,
            &request.curriculum,
        )
        .for_step(&skill.name, block_type);
        match self
            .retriever
            .retrieve_within(&query, self.config.top_k, self.config.min_score, deadline)
            .await
        {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!(step = index, skill = %skill.name, error = %err, "Retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_pipeline_order() {
        use AssemblyState::*;
        assert!(SelectingSkills.can_transition_to(RetrievingContext));
        assert!(RetrievingContext.can_transition_to(GeneratingBlocks));
        assert!(GeneratingBlocks.can_transition_to(Assembled));
        assert!(RetrievingContext.can_transition_to(Failed));
        assert!(!SelectingSkills.can_transition_to(GeneratingBlocks));
        assert!(!Assembled.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(SelectingSkills));
    }

    #[test]
    fn log_rejects_skipped_states() {
        let mut log = AssemblyLog::new("lesson");
        assert!(log.advance(AssemblyState::Assembled).is_err());
        log.advance(AssemblyState::RetrievingContext).unwrap();
        let err = log.fail(ApiError::Retrieval("down".to_string()));
        assert!(matches!(err, ApiError::Retrieval(_)));
        assert_eq!(
            log.states(),
            &[AssemblyState::SelectingSkills, AssemblyState::RetrievingContext, AssemblyState::Failed]
        );
    }
}
