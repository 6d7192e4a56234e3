//! Curriculum context retrieval: embed, search, rank, dedup, budget.

use crate::concurrency::Deadline;
use crate::error::ApiError;
use crate::lesson::BlockType;
use crate::retrieval::embedder::{cosine_similarity, Embedder};
use crate::retrieval::store::{SearchFilter, VectorMatch, VectorStore};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    pub source: String,
    /// Relevance in [0, 1].
    pub score: f32,
}

impl ContextChunk {
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

/// What a lesson step asks the retriever for.
#[derive(Debug, Clone)]
pub struct RetrievalQuery<'a> {
    pub topic: &'a str,
    pub subject: &'a str,
    pub grade: &'a str,
    pub curriculum: &'a str,
    pub skill: Option<&'a str>,
    pub block_type: Option<BlockType>,
}

impl<'a> RetrievalQuery<'a> {
    pub fn new(topic: &'a str, subject: &'a str, grade: &'a str, curriculum: &'a str) -> Self {
        Self {
            topic,
            subject,
            grade,
            curriculum,
            skill: None,
            block_type: None,
        }
    }

    pub fn for_step(mut self, skill: &'a str, block_type: BlockType) -> Self {
        self.skill = Some(skill);
        self.block_type = Some(block_type);
        self
    }

    /// Text that gets embedded for the similarity search.
    pub fn text(&self) -> String {
        let mut parts = vec![
            self.topic.to_string(),
            self.subject.to_string(),
            self.grade.to_string(),
            self.curriculum.to_string(),
        ];
        if let Some(skill) = self.skill {
            parts.push(skill.to_string());
        }
        if let Some(block_type) = self.block_type {
            parts.push(block_type.to_string());
        }
        parts.retain(|p| !p.trim().is_empty());
        parts.join(" ")
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter::for_request(self.curriculum, self.grade)
    }
}

#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    pub top_k: usize,
    pub min_score: f32,
    /// Chunks more similar than this to a better-ranked chunk are dropped.
    pub dedup_threshold: f32,
    /// Upper bound on the summed token estimate of returned chunks.
    pub token_budget: usize,
    pub retry: RetryPolicy,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.2,
            dedup_threshold: 0.95,
            token_budget: 1_500,
            retry: RetryPolicy::retrieval_default(),
        }
    }
}

pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: RetrieverSettings,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrieverSettings {
        &self.settings
    }

    /// Ranked chunks, at most `top_k`, each scoring at least `min_score`.
    /// An empty result is not an error.
    pub async fn retrieve(
        &self,
        query: &RetrievalQuery<'_>,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ContextChunk>, ApiError> {
        self.retrieve_within(query, top_k, min_score, &Deadline::none())
            .await
    }

    /// Same as [`retrieve`](Self::retrieve), with every backend call and
    /// backoff bounded by `deadline`. Transient failures are retried per the
    /// configured policy; the final failure surfaces as `ApiError::Retrieval`.
    pub async fn retrieve_within(
        &self,
        query: &RetrievalQuery<'_>,
        top_k: usize,
        min_score: f32,
        deadline: &Deadline,
    ) -> Result<Vec<ContextChunk>, ApiError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_text = query.text();
        let filter = query.filter();
        let mut attempt: u32 = 1;

        let matches = loop {
            let result = deadline
                .run(self.search_once(&query_text, &filter, top_k))
                .await
                .map_err(|_| ApiError::Retrieval("deadline exceeded during search".to_string()))?;

            match result {
                Ok(matches) => break matches,
                Err(err) => {
                    let retry = err.is_retryable() && self.settings.retry.should_retry(attempt);
                    warn!(
                        attempt,
                        store = self.store.name(),
                        error = %err,
                        will_retry = retry,
                        "Context retrieval attempt failed"
                    );
                    if !retry {
                        return Err(ApiError::Retrieval(format!(
                            "{} after {} attempt(s)",
                            err, attempt
                        )));
                    }
                    deadline
                        .sleep(self.settings.retry.delay_after(attempt))
                        .await
                        .map_err(|_| {
                            ApiError::Retrieval("deadline exceeded during backoff".to_string())
                        })?;
                    attempt += 1;
                }
            }
        };

        let candidates = rank_matches(matches, min_score);
        let mut with_vectors = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let vector = match &candidate.values {
                Some(values) if !values.is_empty() => values.clone(),
                _ => deadline
                    .run(self.embedder.embed(&candidate.text))
                    .await
                    .map_err(|_| {
                        ApiError::Retrieval("deadline exceeded during dedup".to_string())
                    })??,
            };
            with_vectors.push((candidate, vector));
        }

        let chunks = finalize_chunks(
            with_vectors,
            top_k,
            self.settings.dedup_threshold,
            self.settings.token_budget,
        );

        info!(
            query = %query_text,
            attempts = attempt,
            results = chunks.len(),
            "Retrieved curriculum context"
        );
        Ok(chunks)
    }

    async fn search_once(
        &self,
        query_text: &str,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        let embedding = self.embedder.embed(query_text).await?;
        // Over-fetch so dedup does not starve the result.
        self.store
            .search(&embedding, filter, top_k.saturating_mul(2))
            .await
    }
}

/// Clamp scores into [0, 1], drop those under `min_score`, sort descending.
fn rank_matches(matches: Vec<VectorMatch>, min_score: f32) -> Vec<VectorMatch> {
    let mut ranked: Vec<VectorMatch> = matches
        .into_iter()
        .filter(|m| !m.text.trim().is_empty())
        .map(|mut m| {
            m.score = if m.score.is_finite() {
                m.score.clamp(0.0, 1.0)
            } else {
                0.0
            };
            m
        })
        .filter(|m| m.score >= min_score)
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    ranked
}

/// Dedup ranked candidates, cap at `top_k`, then drop from the low end
/// until the token budget holds.
fn finalize_chunks(
    ranked: Vec<(VectorMatch, Vec<f32>)>,
    top_k: usize,
    dedup_threshold: f32,
    token_budget: usize,
) -> Vec<ContextChunk> {
    let mut kept: Vec<(ContextChunk, Vec<f32>)> = Vec::new();
    for (candidate, vector) in ranked {
        let duplicate = kept
            .iter()
            .any(|(_, kept_vector)| cosine_similarity(&vector, kept_vector) > dedup_threshold);
        if duplicate {
            debug!(id = %candidate.id, "Dropping near-duplicate chunk");
            continue;
        }
        kept.push((
            ContextChunk {
                text: candidate.text,
                source: candidate.source,
                score: candidate.score,
            },
            vector,
        ));
        if kept.len() == top_k {
            break;
        }
    }

    let mut chunks: Vec<ContextChunk> = kept.into_iter().map(|(chunk, _)| chunk).collect();
    let mut total: usize = chunks.iter().map(ContextChunk::estimated_tokens).sum();
    while total > token_budget {
        match chunks.pop() {
            Some(dropped) => total -= dropped.estimated_tokens(),
            None => break,
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::HashingEmbedder;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn hit(id: &str, text: &str, score: f32, values: Option<Vec<f32>>) -> VectorMatch {
        VectorMatch {
            id: id.to_string(),
            text: text.to_string(),
            source: format!("{}.pdf", id),
            score,
            values,
        }
    }

    struct FixedStore {
        matches: Vec<VectorMatch>,
        failures_left: Mutex<usize>,
        calls: Mutex<usize>,
    }

    impl FixedStore {
        fn new(matches: Vec<VectorMatch>, failures: usize) -> Self {
            Self {
                matches,
                failures_left: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn search(
            &self,
            _embedding: &[f32],
            _filter: &SearchFilter,
            top_k: usize,
        ) -> Result<Vec<VectorMatch>, ApiError> {
            *self.calls.lock() += 1;
            let mut failures = self.failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(ApiError::ProviderRequestFailed("connection reset".to_string()));
            }
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn retriever(store: Arc<FixedStore>, settings: RetrieverSettings) -> ContextRetriever {
        ContextRetriever::new(Arc::new(HashingEmbedder::default()), store, settings)
    }

    fn query() -> RetrievalQuery<'static> {
        RetrievalQuery::new("Plant life cycles", "Science", "Year 4", "UK KS2")
    }

    #[test]
    fn query_text_includes_step_context() {
        let q = query().for_step("Compare", BlockType::MapIt);
        assert_eq!(q.text(), "Plant life cycles Science Year 4 UK KS2 Compare MapIt");
        assert_eq!(q.filter().grades.len(), 2);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[tokio::test]
    async fn respects_top_k_and_min_score() {
        let store = Arc::new(FixedStore::new(
            vec![
                hit("a", "seeds germinate in spring", 0.9, None),
                hit("b", "roots absorb water from soil", 0.8, None),
                hit("c", "leaves make food using sunlight", 0.7, None),
                hit("d", "flowers attract pollinating insects", 0.1, None),
            ],
            0,
        ));
        let retriever = retriever(store, RetrieverSettings::default());
        let chunks = retriever.retrieve(&query(), 2, 0.5).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.score >= 0.5));
        assert_eq!(chunks[0].source, "a.pdf");

        let none = retriever.retrieve(&query(), 5, 0.95).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn clamps_scores_and_dedups_near_identical_chunks() {
        let store = Arc::new(FixedStore::new(
            vec![
                hit("a", "seeds germinate in spring", 1.4, Some(vec![1.0, 0.0])),
                hit("b", "seeds germinate in spring!", 0.9, Some(vec![0.99, 0.01])),
                hit("c", "roots absorb water", 0.8, Some(vec![0.0, 1.0])),
            ],
            0,
        ));
        let retriever = retriever(store, RetrieverSettings::default());
        let chunks = retriever.retrieve(&query(), 5, 0.0).await.unwrap();
        let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["a.pdf", "c.pdf"]);
        assert_eq!(chunks[0].score, 1.0);
    }

    #[tokio::test]
    async fn token_budget_drops_lowest_ranked_first() {
        let long = "x".repeat(400);
        let store = Arc::new(FixedStore::new(
            vec![
                hit("a", &format!("alpha {}", long), 0.9, Some(vec![1.0, 0.0, 0.0])),
                hit("b", &format!("beta {}", long), 0.8, Some(vec![0.0, 1.0, 0.0])),
                hit("c", &format!("gamma {}", long), 0.7, Some(vec![0.0, 0.0, 1.0])),
            ],
            0,
        ));
        let settings = RetrieverSettings {
            token_budget: 250,
            ..RetrieverSettings::default()
        };
        let chunks = retriever(store, settings)
            .retrieve(&query(), 5, 0.0)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].source, "b.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let store = Arc::new(FixedStore::new(
            vec![hit("a", "seeds germinate", 0.9, None)],
            2,
        ));
        let chunks = retriever(store.clone(), RetrieverSettings::default())
            .retrieve(&query(), 3, 0.0)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(*store.calls.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let store = Arc::new(FixedStore::new(vec![], 10));
        let err = retriever(store.clone(), RetrieverSettings::default())
            .retrieve(&query(), 3, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Retrieval(_)));
        assert_eq!(*store.calls.lock(), 3);
    }
}
